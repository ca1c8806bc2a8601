//! Default configuration constants for voxstream.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default frame duration in milliseconds.
///
/// 60ms frames keep end-to-end latency low while staying large enough that
/// per-frame overhead (framing, VAD invocation) is negligible.
pub const CHUNK_MS: u32 = 60;

/// Samples in one frame at the default rate (16kHz * 60ms).
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE as usize / 1000) * CHUNK_MS as usize;

/// Default recognition service host.
pub const HOST: &str = "localhost";

/// Default recognition service port.
pub const PORT: u16 = 10095;

/// Depth of the server-side frame ring in frames.
///
/// The ring is the sole source of pre-roll audio, so an utterance start can
/// never reach further back than this many frames (1.2s at 60ms frames).
pub const RING_DEPTH_FRAMES: usize = 20;

/// Default frames per incremental decode step.
pub const CHUNK_INTERVAL: u32 = 10;

/// Default encoder lookback window (frames before / current / frames after).
pub const CHUNK_SIZE: [u32; 3] = [5, 10, 5];

/// Default encoder chunk look-back for the streaming decoder.
pub const ENCODER_CHUNK_LOOK_BACK: u32 = 4;

/// Default decoder chunk look-back for the streaming decoder.
pub const DECODER_CHUNK_LOOK_BACK: u32 = 0;

/// Default session label reported back in result records.
pub const WAV_NAME: &str = "microphone";

/// Maximum reconnect attempts before the connection manager reports a
/// terminal error.
pub const MAX_RETRIES: u32 = 3;

/// Initial reconnect delay. Doubles after each failed attempt.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Ceiling for the reconnect delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// How long the client waits for the peer to flush in-flight results
/// after a cooperative stop before force-closing the connection.
pub const STOP_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Default RMS threshold for the energy-based VAD (0.0 to 1.0).
pub const VAD_THRESHOLD: f32 = 0.02;

/// Consecutive sub-threshold frames before the energy VAD declares an
/// utterance end (hangover). 8 frames = 480ms at the default frame size.
pub const VAD_HANGOVER_FRAMES: u32 = 8;
