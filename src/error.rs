//! Error types for voxstream.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Session not configured: a control message must precede audio frames")]
    SessionNotConfigured,

    // Transport errors
    #[error("Connection to {address} failed: {message}")]
    Connection { address: String, message: String },

    #[error("Connection retries exhausted after {attempts} attempts: {message}")]
    ConnectionExhausted { attempts: u32, message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // Engine errors
    #[error("Voice activity detection failed: {message}")]
    Vad { message: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    #[error("Punctuation restoration failed: {message}")]
    Punctuation { message: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxError>;

impl VoxError {
    /// True for errors the connection manager treats as transient and retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VoxError::Connection { .. } | VoxError::WebSocket(_) | VoxError::Io(_)
        )
    }
}
