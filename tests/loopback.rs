//! Full client/server loopback over a real WebSocket.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use voxstream::audio::source::MockFrameSource;
use voxstream::client::{ConnectionConfig, ConnectionManager, ResultSink};
use voxstream::engine::Engines;
use voxstream::engine::punctuate::MockPunctuator;
use voxstream::engine::recognizer::MockRecognizer;
use voxstream::engine::vad::MockVad;
use voxstream::protocol::{ControlMessage, Mode};
use voxstream::server::Dispatcher;

const FRAME: usize = 960;

struct Harness {
    address: std::net::SocketAddr,
    shutdown: watch::Sender<bool>,
    dispatcher: Arc<Dispatcher>,
}

async fn start_server(engines: Engines) -> Harness {
    let dispatcher = Arc::new(Dispatcher::new(engines));
    let (listener, address) = Dispatcher::bind("127.0.0.1:0").await.expect("bind");
    let (shutdown, shutdown_rx) = watch::channel(false);

    let serve = Arc::clone(&dispatcher);
    tokio::spawn(async move {
        let _ = serve.serve(listener, shutdown_rx).await;
    });

    Harness {
        address,
        shutdown,
        dispatcher,
    }
}

fn connection(address: std::net::SocketAddr) -> ConnectionConfig {
    ConnectionConfig {
        host: address.ip().to_string(),
        port: address.port(),
        // Fast pacing keeps the test short; the protocol is rate-agnostic.
        chunk_ms: 5,
        stop_flush_timeout: Duration::from_secs(5),
        ..ConnectionConfig::default()
    }
}

fn collecting_sink() -> (Arc<ResultSink>, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
    let finals = Arc::new(Mutex::new(Vec::new()));
    let partials = Arc::new(Mutex::new(Vec::new()));
    let mut sink = ResultSink::new();

    let finals_tx = Arc::clone(&finals);
    sink.on_utterance(move |record| {
        finals_tx.lock().unwrap().push(record.text.clone());
    });
    let partials_tx = Arc::clone(&partials);
    sink.on_partial(move |record| {
        partials_tx.lock().unwrap().push(record.text.clone());
    });

    (Arc::new(sink), finals, partials)
}

/// Offline mode: the client streams a finite source, the server finalizes on
/// a detected speech end, and the exhaustion handshake closes the session
/// cleanly after the flush.
#[tokio::test]
async fn offline_utterance_round_trip() {
    let engines = Engines {
        vad: Arc::new(
            MockVad::new()
                .with_start_at(3, 3 * FRAME as i64)
                .with_end_at(20, 20 * FRAME as i64),
        ),
        online: Arc::new(MockRecognizer::new()),
        // One scripted utterance; the end-of-stream completion marker that
        // follows it is empty and must not reach the utterance callback.
        offline: Arc::new(MockRecognizer::new().with_responses(&["hello world"])),
        punctuator: Some(Arc::new(MockPunctuator::new())),
    };
    let server = start_server(engines).await;

    let (sink, finals, _partials) = collecting_sink();
    let source = MockFrameSource::new().with_frames(vec![vec![3000i16; FRAME]; 30]);
    let control = ControlMessage {
        mode: Some(Mode::Offline),
        wav_name: Some("loopback".to_string()),
        is_speaking: Some(true),
        ..ControlMessage::default()
    };

    let manager = ConnectionManager::new(connection(server.address), control, source, sink);
    manager.run().await.expect("clean shutdown");

    assert_eq!(*finals.lock().unwrap(), vec!["hello world.".to_string()]);

    let _ = server.shutdown.send(true);
}

/// 2pass mode: partials stream while speaking, and the single authoritative
/// final arrives from the offline pass triggered by the end-of-utterance
/// declaration.
#[tokio::test]
async fn two_pass_partials_and_final_round_trip() {
    let engines = Engines {
        vad: Arc::new(MockVad::new().with_start_at(2, 2 * FRAME as i64)),
        online: Arc::new(MockRecognizer::new().with_response("partial text")),
        offline: Arc::new(MockRecognizer::new().with_response("full text")),
        punctuator: Some(Arc::new(MockPunctuator::new())),
    };
    let server = start_server(engines).await;

    let (sink, finals, partials) = collecting_sink();
    let source = MockFrameSource::new().with_frames(vec![vec![3000i16; FRAME]; 30]);
    let control = ControlMessage {
        mode: Some(Mode::TwoPass),
        chunk_interval: Some(2),
        is_speaking: Some(true),
        ..ControlMessage::default()
    };

    let manager = ConnectionManager::new(connection(server.address), control, source, sink);
    manager.run().await.expect("clean shutdown");

    assert!(
        !partials.lock().unwrap().is_empty(),
        "2pass must stream partials"
    );
    assert!(
        partials
            .lock()
            .unwrap()
            .iter()
            .all(|t| t == "partial text")
    );
    assert_eq!(*finals.lock().unwrap(), vec!["full text.".to_string()]);

    let _ = server.shutdown.send(true);
}

/// A connection dropped mid-stream triggers reconnect: the manager backs
/// off, resends the control message, and the replacement server session
/// starts fresh with no residual speaking state.
#[tokio::test]
async fn reconnect_behaves_like_fresh_session() {
    use futures_util::StreamExt;

    let (listener, address) = Dispatcher::bind("127.0.0.1:0").await.expect("bind");

    // First connection: complete the handshake, swallow a few messages, then
    // drop mid-utterance. The listener stays open throughout, so the
    // reconnect attempt queues in the backlog until the real server takes
    // over.
    let flaky = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake");
        for _ in 0..5 {
            if ws.next().await.is_none() {
                break;
            }
        }
        drop(ws);
        listener
    });

    let finals = Arc::new(Mutex::new(Vec::new()));
    let mut sink = ResultSink::new();
    let finals_tx = Arc::clone(&finals);
    sink.on_utterance(move |record| {
        finals_tx
            .lock()
            .unwrap()
            .push((record.text.clone(), record.wav_name.clone()));
    });

    let mut config = connection(address);
    config.base_delay = Duration::from_millis(50);
    config.max_delay = Duration::from_millis(50);
    // The start fires at the replacement session's frame 2: a fresh session
    // opens its own utterance instead of inheriting one.
    let engines = Engines {
        vad: Arc::new(MockVad::new().with_start_at(2, 2 * FRAME as i64)),
        online: Arc::new(MockRecognizer::new()),
        offline: Arc::new(MockRecognizer::new().with_responses(&["second take"])),
        punctuator: Some(Arc::new(MockPunctuator::new())),
    };
    let source = MockFrameSource::new().with_frames(vec![vec![3000i16; FRAME]; 60]);
    let control = ControlMessage {
        mode: Some(Mode::Offline),
        wav_name: Some("take-two".to_string()),
        is_speaking: Some(true),
        ..ControlMessage::default()
    };

    let manager = ConnectionManager::new(config, control, source, Arc::new(sink));
    let client = tokio::spawn(manager.run());

    // Hand the listener to the real dispatcher once the first connection has
    // been killed.
    let listener = flaky.await.expect("flaky connection ran");
    let dispatcher = Arc::new(Dispatcher::new(engines));
    let (shutdown, shutdown_rx) = watch::channel(false);
    let serve = Arc::clone(&dispatcher);
    tokio::spawn(async move {
        let _ = serve.serve(listener, shutdown_rx).await;
    });

    client
        .await
        .expect("client task")
        .expect("finish after reconnect");

    // Exactly one final, carrying the resent control message's label.
    let finals = finals.lock().unwrap();
    assert_eq!(
        *finals,
        vec![("second take.".to_string(), "take-two".to_string())]
    );

    let _ = shutdown.send(true);
}

/// A peer that vanishes before the WebSocket handshake must not take the
/// accept loop down; later clients still get served.
#[tokio::test]
async fn server_survives_aborted_connection() {
    let server = start_server(Engines::stub()).await;

    let doomed = tokio::net::TcpStream::connect(server.address)
        .await
        .expect("connect");
    drop(doomed);

    let (sink, _finals, _partials) = collecting_sink();
    let source = MockFrameSource::new().with_frames(vec![vec![0i16; FRAME]; 5]);
    let control = ControlMessage {
        is_speaking: Some(true),
        ..ControlMessage::default()
    };

    let manager = ConnectionManager::new(connection(server.address), control, source, sink);
    manager.run().await.expect("clean shutdown");

    let _ = server.shutdown.send(true);
}

/// The session registry reflects connection lifecycle: one while the client
/// is attached, zero after it disconnects.
#[tokio::test]
async fn session_registry_tracks_connections() {
    let server = start_server(Engines::stub()).await;

    let (sink, _finals, _partials) = collecting_sink();
    let source = MockFrameSource::new().with_frames(vec![vec![0i16; FRAME]; 5]);
    let control = ControlMessage {
        is_speaking: Some(true),
        ..ControlMessage::default()
    };

    let manager = ConnectionManager::new(connection(server.address), control, source, sink);
    manager.run().await.expect("clean shutdown");

    // The connection task unregisters on teardown; poll briefly.
    for _ in 0..50 {
        if server.dispatcher.session_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.dispatcher.session_count().await, 0);

    let _ = server.shutdown.send(true);
}
