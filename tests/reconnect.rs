//! Reconnect policy: exponential backoff and terminal exhaustion.

use std::sync::Arc;
use std::time::Duration;
use voxstream::audio::source::MockFrameSource;
use voxstream::client::{ConnectionConfig, ConnectionManager, ResultSink};
use voxstream::error::VoxError;
use voxstream::protocol::ControlMessage;

/// A loopback port with nothing listening on it.
async fn dead_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..ConnectionConfig::default()
    }
}

/// With every connect refused: one initial attempt plus `max_retries`
/// reconnects, separated by doubling delays of 1s, 2s and 4s, then a
/// terminal error. Total waiting must land in [7s, 8s).
#[tokio::test(start_paused = true)]
async fn backoff_schedule_before_exhaustion() {
    let port = dead_port().await;
    let manager = ConnectionManager::new(
        config(port),
        ControlMessage::default(),
        MockFrameSource::new(),
        Arc::new(ResultSink::new()),
    );

    let started = tokio::time::Instant::now();
    let result = manager.run().await;
    let waited = started.elapsed();

    match result {
        Err(VoxError::ConnectionExhausted { attempts, .. }) => {
            assert_eq!(attempts, 4, "1 initial + 3 retries");
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert!(
        waited >= Duration::from_secs(7),
        "backoff waited only {:?}",
        waited
    );
    assert!(
        waited < Duration::from_secs(8),
        "backoff overshot: {:?}",
        waited
    );
}

/// `max_retries = 0` fails after the very first refused connect, without
/// any backoff sleep.
#[tokio::test(start_paused = true)]
async fn no_retries_fails_fast() {
    let port = dead_port().await;
    let manager = ConnectionManager::new(
        ConnectionConfig {
            max_retries: 0,
            ..config(port)
        },
        ControlMessage::default(),
        MockFrameSource::new(),
        Arc::new(ResultSink::new()),
    );

    let started = tokio::time::Instant::now();
    let result = manager.run().await;

    assert!(matches!(
        result,
        Err(VoxError::ConnectionExhausted { attempts: 1, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(1));
}

/// A stop requested before the first connect wins: the manager returns
/// cleanly instead of burning through the retry budget.
#[tokio::test(start_paused = true)]
async fn stop_preempts_connect_loop() {
    let port = dead_port().await;
    let manager = ConnectionManager::new(
        config(port),
        ControlMessage::default(),
        MockFrameSource::new(),
        Arc::new(ResultSink::new()),
    );

    manager.handle().stop();
    let result = manager.run().await;
    assert!(result.is_ok());
}
