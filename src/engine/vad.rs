//! Voice activity detection interface and the built-in energy detector.
//!
//! The detector is a shared, stateless-entry-point service: per-session
//! continuity lives in a [`VadCache`] owned by the session and passed in on
//! every call, so concurrent sessions can share one detector instance.

use crate::defaults;
use crate::error::Result;
use std::collections::HashMap;

/// One speech segment reported by a detector, in sample offsets relative to
/// the start of the stream. `-1` marks an open boundary (start not yet seen
/// in this call, or speech still ongoing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSegment {
    pub start: i64,
    pub end: i64,
}

/// Collapsed detector output for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VadOutcome {
    /// Sample offset of a detected speech start, or -1.
    pub speech_start: i64,
    /// Sample offset of a detected speech end, or -1.
    pub speech_end: i64,
}

impl VadOutcome {
    /// Outcome carrying no boundary information.
    pub const INCONCLUSIVE: VadOutcome = VadOutcome {
        speech_start: -1,
        speech_end: -1,
    };

    /// Collapse raw detector segments into a single outcome.
    ///
    /// Zero segments is inconclusive. More than one segment in a single frame
    /// is also treated as inconclusive: ambiguous output never triggers a
    /// state transition. This mirrors the reference behavior and may drop
    /// legitimate short utterances in noisy audio; it is kept as documented
    /// policy rather than re-derived.
    pub fn from_segments(segments: &[SpeechSegment]) -> VadOutcome {
        if segments.len() != 1 {
            return VadOutcome::INCONCLUSIVE;
        }
        VadOutcome {
            speech_start: segments[0].start,
            speech_end: segments[0].end,
        }
    }

    /// True when neither boundary is present.
    pub fn is_inconclusive(&self) -> bool {
        self.speech_start == -1 && self.speech_end == -1
    }
}

/// Per-session detector cache, round-tripped through every call.
#[derive(Debug, Clone, Default)]
pub struct VadCache {
    /// Samples consumed by the detector so far.
    pub(crate) samples_seen: u64,
    /// Frames consumed by the detector so far.
    pub(crate) frames_seen: u64,
    /// Whether the detector currently considers the stream in-speech.
    pub(crate) in_speech: bool,
    /// Sample offset where the open speech run began.
    pub(crate) run_start: i64,
    /// Consecutive sub-threshold frames while in-speech (hangover counter).
    pub(crate) hang: u32,
}

impl VadCache {
    /// Reset to initial state. Used on explicit end-of-utterance, where the
    /// client declared a full stop and continuity would bleed across streams.
    pub fn reset(&mut self) {
        *self = VadCache::default();
    }
}

/// Trait for voice activity detection over a frame stream.
pub trait VoiceActivityDetector: Send + Sync {
    /// Classify one frame, updating the session's cache.
    ///
    /// Returns the raw segments for this frame; callers collapse them via
    /// [`VadOutcome::from_segments`].
    fn detect(&self, samples: &[i16], cache: &mut VadCache) -> Result<Vec<SpeechSegment>>;
}

/// Configuration for the built-in energy detector.
#[derive(Debug, Clone, Copy)]
pub struct EnergyVadConfig {
    /// RMS threshold for speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Consecutive sub-threshold frames before declaring an utterance end.
    pub hangover_frames: u32,
}

impl Default for EnergyVadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::VAD_THRESHOLD,
            hangover_frames: defaults::VAD_HANGOVER_FRAMES,
        }
    }
}

/// RMS-threshold voice activity detector.
///
/// Declares a speech start on the first frame whose RMS crosses the
/// threshold, and a speech end after `hangover_frames` consecutive frames
/// below it, so natural word gaps do not split utterances.
pub struct EnergyVad {
    config: EnergyVadConfig,
}

impl EnergyVad {
    pub fn new() -> Self {
        Self::with_config(EnergyVadConfig::default())
    }

    pub fn with_config(config: EnergyVadConfig) -> Self {
        Self { config }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn detect(&self, samples: &[i16], cache: &mut VadCache) -> Result<Vec<SpeechSegment>> {
        let frame_start = cache.samples_seen as i64;
        cache.samples_seen += samples.len() as u64;
        cache.frames_seen += 1;

        let is_speech = calculate_rms(samples) > self.config.speech_threshold;

        let mut segments = Vec::new();
        if is_speech {
            if !cache.in_speech {
                cache.in_speech = true;
                cache.run_start = frame_start;
                segments.push(SpeechSegment {
                    start: frame_start,
                    end: -1,
                });
            }
            cache.hang = 0;
        } else if cache.in_speech {
            cache.hang += 1;
            if cache.hang >= self.config.hangover_frames {
                cache.in_speech = false;
                cache.hang = 0;
                segments.push(SpeechSegment {
                    start: -1,
                    end: frame_start,
                });
            }
        }

        Ok(segments)
    }
}

/// Calculate normalized RMS energy of 16-bit samples (0.0 to 1.0).
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Scripted detector for tests.
///
/// Emits a preconfigured segment list on the Nth frame (0-based, counted via
/// the session's cache) and nothing otherwise. Call failures can be scripted
/// the same way to exercise the engine-error path.
#[derive(Default)]
pub struct MockVad {
    scripted: HashMap<u64, Vec<SpeechSegment>>,
    failures: Vec<u64>,
}

impl MockVad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a speech start at the given frame, with the start offset in
    /// samples.
    pub fn with_start_at(mut self, frame: u64, start_offset: i64) -> Self {
        self.scripted.insert(
            frame,
            vec![SpeechSegment {
                start: start_offset,
                end: -1,
            }],
        );
        self
    }

    /// Script a speech end at the given frame, with the end offset in samples.
    pub fn with_end_at(mut self, frame: u64, end_offset: i64) -> Self {
        self.scripted.insert(
            frame,
            vec![SpeechSegment {
                start: -1,
                end: end_offset,
            }],
        );
        self
    }

    /// Script raw segments (e.g. ambiguous multi-segment output) at a frame.
    pub fn with_segments_at(mut self, frame: u64, segments: Vec<SpeechSegment>) -> Self {
        self.scripted.insert(frame, segments);
        self
    }

    /// Script a call failure at the given frame.
    pub fn with_failure_at(mut self, frame: u64) -> Self {
        self.failures.push(frame);
        self
    }
}

impl VoiceActivityDetector for MockVad {
    fn detect(&self, samples: &[i16], cache: &mut VadCache) -> Result<Vec<SpeechSegment>> {
        let frame = cache.frames_seen;
        cache.samples_seen += samples.len() as u64;
        cache.frames_seen += 1;

        if self.failures.contains(&frame) {
            return Err(crate::error::VoxError::Vad {
                message: format!("scripted failure at frame {}", frame),
            });
        }

        Ok(self.scripted.get(&frame).cloned().unwrap_or_default())
    }
}
