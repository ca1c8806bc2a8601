//! Recognizer interfaces for the incremental (online) and final (offline)
//! passes, plus scripted mocks and a stub for wiring.
//!
//! Recognizers are shared services; all per-session continuity lives in a
//! [`DecoderCache`] owned by the session and passed in on every call.

use crate::error::{Result, VoxError};

/// Decoder settings derived from the session's control messages.
///
/// Forwarded to the engines on every call so mid-session setting changes
/// take effect without restarting the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderSettings {
    /// Encoder lookback window: frames before / current / frames after.
    pub chunk_size: [u32; 3],
    pub encoder_chunk_look_back: u32,
    pub decoder_chunk_look_back: u32,
    /// Space-separated bias phrases.
    pub hotwords: String,
    /// Inverse text normalization in final output.
    pub itn: bool,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            chunk_size: crate::defaults::CHUNK_SIZE,
            encoder_chunk_look_back: crate::defaults::ENCODER_CHUNK_LOOK_BACK,
            decoder_chunk_look_back: crate::defaults::DECODER_CHUNK_LOOK_BACK,
            hotwords: String::new(),
            itn: true,
        }
    }
}

/// Per-session decoder cache, round-tripped through every recognizer call.
///
/// The session owns one instance per pass (online and offline). Interiors are
/// engine-defined; the session only resets the cache at utterance boundaries.
#[derive(Debug, Clone, Default)]
pub struct DecoderCache {
    /// Set before the last incremental call of an utterance so the engine can
    /// flush its internal lookahead.
    pub is_final: bool,
    /// Calls made against this cache; engines may key internal state on it.
    pub calls: u64,
    /// Carried-over samples for engines that decode on fixed boundaries.
    pub carry: Vec<i16>,
}

impl DecoderCache {
    /// Reset to initial state at an utterance boundary.
    pub fn reset(&mut self) {
        *self = DecoderCache::default();
    }
}

/// Incremental recognizer: partial transcript from an in-progress utterance.
pub trait IncrementalRecognizer: Send + Sync {
    /// Decode one window of audio, updating the session's cache.
    ///
    /// Returns the partial transcript delta for this window; empty means
    /// nothing new to report.
    fn recognize(
        &self,
        samples: &[i16],
        settings: &DecoderSettings,
        cache: &mut DecoderCache,
    ) -> Result<String>;
}

/// Final recognizer: authoritative transcript once an utterance end is known.
pub trait FinalRecognizer: Send + Sync {
    /// Decode a complete utterance, updating the session's cache.
    fn recognize(
        &self,
        samples: &[i16],
        settings: &DecoderSettings,
        cache: &mut DecoderCache,
    ) -> Result<String>;
}

/// Placeholder recognizer that recognizes nothing.
///
/// Keeps the `serve` binary runnable without a model; a deployment replaces
/// it by constructing [`crate::engine::Engines`] with a real backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubRecognizer;

impl IncrementalRecognizer for StubRecognizer {
    fn recognize(
        &self,
        _samples: &[i16],
        _settings: &DecoderSettings,
        cache: &mut DecoderCache,
    ) -> Result<String> {
        cache.calls += 1;
        Ok(String::new())
    }
}

impl FinalRecognizer for StubRecognizer {
    fn recognize(
        &self,
        _samples: &[i16],
        _settings: &DecoderSettings,
        cache: &mut DecoderCache,
    ) -> Result<String> {
        cache.calls += 1;
        Ok(String::new())
    }
}

/// Scripted recognizer for tests. Implements both passes.
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    responses: Vec<String>,
    fixed: Option<String>,
    should_fail: bool,
    /// Report the sample count instead of a fixed response.
    echo_len: bool,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the same text on every call.
    pub fn with_response(mut self, response: &str) -> Self {
        self.fixed = Some(response.to_string());
        self
    }

    /// Return these texts call by call, then empty strings.
    pub fn with_responses(mut self, responses: &[&str]) -> Self {
        self.responses = responses.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Return `"<n> samples"` so tests can assert on the audio handed over.
    pub fn with_sample_echo(mut self) -> Self {
        self.echo_len = true;
        self
    }

    fn respond(&self, samples: &[i16], cache: &mut DecoderCache) -> Result<String> {
        if self.should_fail {
            return Err(VoxError::Recognition {
                message: "scripted recognizer failure".to_string(),
            });
        }
        let call = cache.calls as usize;
        cache.calls += 1;

        if self.echo_len {
            return Ok(format!("{} samples", samples.len()));
        }
        if let Some(ref fixed) = self.fixed {
            return Ok(fixed.clone());
        }
        Ok(self.responses.get(call).cloned().unwrap_or_default())
    }
}

impl IncrementalRecognizer for MockRecognizer {
    fn recognize(
        &self,
        samples: &[i16],
        _settings: &DecoderSettings,
        cache: &mut DecoderCache,
    ) -> Result<String> {
        self.respond(samples, cache)
    }
}

impl FinalRecognizer for MockRecognizer {
    fn recognize(
        &self,
        samples: &[i16],
        _settings: &DecoderSettings,
        cache: &mut DecoderCache,
    ) -> Result<String> {
        self.respond(samples, cache)
    }
}
