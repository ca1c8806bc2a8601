//! voxstream - Real-time streaming speech-to-text over WebSocket
//!
//! A client/server pair for low-latency speech recognition: the client
//! captures audio and streams fixed-size PCM frames; the server segments
//! speech with VAD and runs incremental and final recognition passes,
//! pushing results back over the same connection.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod output;
pub mod protocol;
pub mod server;

// Core traits (capture → transport → recognize)
pub use audio::source::FrameSource;
pub use engine::punctuate::Punctuator;
pub use engine::recognizer::{FinalRecognizer, IncrementalRecognizer};
pub use engine::vad::VoiceActivityDetector;

// Wire protocol
pub use protocol::{ControlMessage, Mode, ResultRecord};

// Client and server entry points
pub use client::{ConnectionConfig, ConnectionManager, ResultSink};
pub use server::Dispatcher;

// Error handling
pub use error::{Result, VoxError};

// Config
pub use config::Config;
