//! Client connection manager.
//!
//! Maintains one logical streaming session against intermittent
//! connectivity: connects, sends the session's control message, then runs
//! the frame-paced send path and the result-dispatching receive path
//! concurrently until the peer drops, the source is exhausted, or `stop()`
//! is requested. Unexpected closures are retried with exponential backoff
//! up to a retry budget, after which a terminal error is surfaced.

use crate::audio::source::FrameSource;
use crate::client::sink::ResultSink;
use crate::defaults;
use crate::error::{Result, VoxError};
use crate::protocol::{ControlMessage, ResultRecord, encode_pcm_frame};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection parameters for the recognition service.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// Reconnect attempts after the initial one before giving up.
    pub max_retries: u32,
    /// Initial reconnect delay; doubles per attempt up to `max_delay`.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Frame pacing interval in milliseconds.
    pub chunk_ms: u32,
    /// How long to wait for in-flight results after a cooperative stop.
    pub stop_flush_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            tls: false,
            max_retries: defaults::MAX_RETRIES,
            base_delay: defaults::RETRY_BASE_DELAY,
            max_delay: defaults::RETRY_MAX_DELAY,
            chunk_ms: defaults::CHUNK_MS,
            stop_flush_timeout: defaults::STOP_FLUSH_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// WebSocket URL for this configuration.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Handle for requesting a cooperative stop from another task.
#[derive(Clone)]
pub struct ManagerHandle {
    stop_tx: watch::Sender<bool>,
}

impl ManagerHandle {
    /// Request a stop. The send path observes this within one frame
    /// interval; the connection is closed after in-flight results flush.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// True once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// How one connected session ended.
enum SessionEnd {
    /// Cooperative stop or source exhaustion; no reconnect.
    Finished,
    /// The peer dropped or errored; counts against the retry budget.
    ConnectionLost,
}

/// Owns the transport session for one logical streaming session.
pub struct ConnectionManager<S: FrameSource> {
    config: ConnectionConfig,
    /// Sent as the first message on every (re)connect: server-side session
    /// state does not survive reconnects.
    control: ControlMessage,
    source: S,
    sink: Arc<ResultSink>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl<S: FrameSource> ConnectionManager<S> {
    pub fn new(
        config: ConnectionConfig,
        control: ControlMessage,
        source: S,
        sink: Arc<ResultSink>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            config,
            control,
            source,
            sink,
            stop_tx,
            stop_rx,
        }
    }

    /// Handle for stopping the manager from another task.
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Run the session to completion.
    ///
    /// Returns `Ok(())` after a cooperative stop or source exhaustion, and
    /// `VoxError::ConnectionExhausted` once the retry budget is spent.
    pub async fn run(mut self) -> Result<()> {
        let url = self.config.url();
        let mut delay = self.config.base_delay;
        let mut attempts = 0u32;
        let mut last_error = String::new();

        loop {
            if *self.stop_rx.borrow() {
                return Ok(());
            }

            match connect_async(&url).await {
                Ok((ws, _response)) => {
                    eprintln!("Connected to {}", url);
                    match self.run_session(ws).await {
                        Ok(SessionEnd::Finished) => return Ok(()),
                        Ok(SessionEnd::ConnectionLost) => {
                            last_error = "connection closed unexpectedly".to_string();
                        }
                        Err(e) if e.is_transient() => {
                            last_error = e.to_string();
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            attempts += 1;
            if attempts > self.config.max_retries {
                return Err(VoxError::ConnectionExhausted {
                    attempts,
                    message: last_error,
                });
            }

            eprintln!(
                "Connection to {} lost ({}), retrying in {:?} ({}/{})",
                url, last_error, delay, attempts, self.config.max_retries
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.config.max_delay);
        }
    }

    /// Drive one connected session: send path and receive path concurrently.
    ///
    /// Returns `Err` only for non-transient failures (frame source errors);
    /// transport problems map to `SessionEnd::ConnectionLost`.
    async fn run_session(&mut self, ws: WsStream) -> Result<SessionEnd> {
        let (mut tx, mut rx) = ws.split();

        // Handshake: the first message is always a control message. There is
        // no reply; acknowledgement is implicit via the first result record.
        let control_json = self.control.to_json().map_err(|e| VoxError::Protocol {
            message: format!("control serialization failed: {}", e),
        })?;
        if tx.send(Message::Text(control_json.into())).await.is_err() {
            return Ok(SessionEnd::ConnectionLost);
        }

        self.source.start()?;

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.chunk_ms as u64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stop_rx = self.stop_rx.clone();
        // While sending, the flush deadline is effectively never.
        let far_future = Instant::now() + Duration::from_secs(86400);
        let mut sending = true;
        let mut flush_deadline = far_future;

        let end = loop {
            tokio::select! {
                _ = interval.tick(), if sending => {
                    match self.source.read_frame() {
                        Ok(Some(frame)) => {
                            if frame.is_empty() {
                                continue; // device has nothing buffered yet
                            }
                            if tx.send(Message::Binary(encode_pcm_frame(&frame))).await.is_err() {
                                break SessionEnd::ConnectionLost;
                            }
                        }
                        Ok(None) => {
                            // Source exhausted: declare end-of-utterance so
                            // the server finalizes, then wait for the flush.
                            let eou = ControlMessage::end_of_utterance();
                            if let Ok(json) = eou.to_json()
                                && tx.send(Message::Text(json.into())).await.is_err()
                            {
                                break SessionEnd::ConnectionLost;
                            }
                            sending = false;
                            flush_deadline = Instant::now() + self.config.stop_flush_timeout;
                        }
                        Err(e) => {
                            eprintln!("Frame read failed, frame skipped: {}", e);
                        }
                    }
                }
                _ = stop_rx.changed(), if sending => {
                    if *stop_rx.borrow() {
                        // Cooperative stop: stop emitting but let already
                        // sent frames flush before closing.
                        let eou = ControlMessage::end_of_utterance();
                        if let Ok(json) = eou.to_json() {
                            let _ = tx.send(Message::Text(json.into())).await;
                        }
                        sending = false;
                        flush_deadline = Instant::now() + self.config.stop_flush_timeout;
                    }
                }
                _ = tokio::time::sleep_until(flush_deadline), if !sending => {
                    // Peer did not finish flushing in time; close anyway.
                    break SessionEnd::Finished;
                }
                message = rx.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            match ResultRecord::from_json(&text) {
                                Ok(record) => {
                                    let is_final = record.is_final;
                                    self.sink.dispatch(&record);
                                    if !sending && is_final {
                                        // Flush complete.
                                        break SessionEnd::Finished;
                                    }
                                }
                                Err(e) => {
                                    // Non-fatal: drop the message, keep the
                                    // receive path alive.
                                    eprintln!("Malformed result record dropped: {}", e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            break if sending {
                                SessionEnd::ConnectionLost
                            } else {
                                SessionEnd::Finished
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            eprintln!("Receive failed: {}", e);
                            break SessionEnd::ConnectionLost;
                        }
                    }
                }
            }
        };

        let _ = tx.send(Message::Close(None)).await;
        if let Err(e) = self.source.stop() {
            eprintln!("Frame source failed to stop: {}", e);
        }
        Ok(end)
    }
}
