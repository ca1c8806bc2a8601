//! WebSocket accept loop and per-connection session lifecycle.
//!
//! The dispatcher's responsibility is limited to lifecycle: one
//! [`RecognitionSession`] is created when a connection opens, driven by that
//! connection's message loop, and dropped (discarding any in-flight
//! utterance) when the connection closes or errors. Sessions share the
//! engine set but no state, so connections are handled in parallel.

use crate::engine::Engines;
use crate::error::{Result, VoxError};
use crate::protocol::{ControlMessage, decode_pcm_frame};
use crate::server::session::RecognitionSession;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::Message;

/// Owns the listener and the set of live sessions.
pub struct Dispatcher {
    engines: Engines,
    next_id: AtomicU64,
    live: Arc<Mutex<HashSet<u64>>>,
}

impl Dispatcher {
    pub fn new(engines: Engines) -> Self {
        Self {
            engines,
            next_id: AtomicU64::new(0),
            live: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of currently open sessions.
    pub async fn session_count(&self) -> usize {
        self.live.lock().await.len()
    }

    /// Bind to the address and return the listener plus the bound address
    /// (useful with port 0 in tests).
    pub async fn bind(address: &str) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| VoxError::Connection {
                address: address.to_string(),
                message: format!("bind failed: {}", e),
            })?;
        let local = listener.local_addr()?;
        Ok((listener, local))
    }

    /// Accept connections until the shutdown signal fires.
    ///
    /// Each connection runs in its own task; a connection error tears down
    /// only that session.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            // One refused or reset handshake must not take the
                            // listener down with it.
                            eprintln!("Accept failed, listener continues: {}", e);
                            continue;
                        }
                    };
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    let dispatcher = Arc::clone(&self);
                    tokio::spawn(async move {
                        dispatcher.run_connection(stream, peer, id).await;
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Drive one connection from WebSocket handshake to teardown.
    async fn run_connection(&self, stream: TcpStream, peer: SocketAddr, id: u64) {
        let count = {
            let mut live = self.live.lock().await;
            live.insert(id);
            live.len()
        };
        eprintln!("Connection from {} opened ({} active)", peer, count);

        if let Err(e) = self.handle_messages(stream, peer).await {
            eprintln!("Connection from {} errored: {}", peer, e);
        }

        // Session state is dropped with this scope: a close mid-utterance
        // discards the unfinalized utterance rather than emitting a partial
        // final.
        let count = {
            let mut live = self.live.lock().await;
            live.remove(&id);
            live.len()
        };
        eprintln!("Connection from {} closed ({} active)", peer, count);
    }

    async fn handle_messages(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (mut tx, mut rx) = ws.split();
        let mut session = RecognitionSession::new(self.engines.clone());

        while let Some(message) = rx.next().await {
            let records = match message? {
                Message::Text(text) => match ControlMessage::from_json(&text) {
                    Ok(control) => match session.apply_control(&control) {
                        Ok(records) => records,
                        Err(e) => {
                            // Configuration errors drop the message, not the
                            // connection; the client can correct and resend.
                            eprintln!("Control message from {} rejected: {}", peer, e);
                            continue;
                        }
                    },
                    Err(e) => {
                        eprintln!("Malformed control message from {} dropped: {}", peer, e);
                        continue;
                    }
                },
                Message::Binary(bytes) => {
                    let samples = match decode_pcm_frame(&bytes) {
                        Ok(samples) => samples,
                        Err(e) => {
                            eprintln!("Malformed audio frame from {} dropped: {}", peer, e);
                            continue;
                        }
                    };
                    match session.push_frame(&samples) {
                        Ok(records) => records,
                        Err(e) => {
                            eprintln!("Audio frame from {} rejected: {}", peer, e);
                            continue;
                        }
                    }
                }
                Message::Ping(payload) => {
                    tx.send(Message::Pong(payload)).await?;
                    continue;
                }
                Message::Close(_) => break,
                _ => continue,
            };

            for record in records {
                let json = record.to_json().map_err(|e| VoxError::Protocol {
                    message: format!("result serialization failed: {}", e),
                })?;
                tx.send(Message::Text(json.into())).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_starts_empty() {
        let dispatcher = Dispatcher::new(Engines::stub());
        assert_eq!(dispatcher.next_id.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let (_listener, addr) = Dispatcher::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_session_count_tracks_registry() {
        let dispatcher = Dispatcher::new(Engines::stub());
        assert_eq!(dispatcher.session_count().await, 0);

        dispatcher.live.lock().await.insert(7);
        assert_eq!(dispatcher.session_count().await, 1);

        dispatcher.live.lock().await.remove(&7);
        assert_eq!(dispatcher.session_count().await, 0);
    }
}
