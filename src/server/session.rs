//! Per-connection recognition session.
//!
//! State machine: `Idle → Listening → Speaking → Listening → … → Closed`.
//! Owns every piece of per-connection mutable state (frame ring, speech
//! buffer, engine caches) so no cross-session locking is needed; the
//! dispatcher drives it single-threaded from the connection's message loop,
//! which keeps frame processing strictly in arrival order.
//!
//! Buffering layout per frame:
//! - `frame_ring` keeps the last `ring_depth` frames and is the sole source
//!   of pre-roll audio when a speech start is detected retroactively.
//! - `online_window` accumulates frames between incremental decode steps.
//! - `speech_frames` holds the open utterance, seeded from the ring on a
//!   detected start and handed to the final recognizer on utterance end.

use crate::defaults;
use crate::engine::Engines;
use crate::engine::punctuate::PunctCache;
use crate::engine::recognizer::{DecoderCache, DecoderSettings};
use crate::engine::vad::{VadCache, VadOutcome};
use crate::error::{Result, VoxError};
use crate::protocol::{ControlMessage, Mode, ResultRecord};
use std::collections::VecDeque;

/// Why an utterance was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    /// The detector reported a speech end inside a continuous stream.
    /// VAD and punctuation continuity are kept.
    VadBoundary,
    /// The client sent `is_speaking=false`. A full stop: VAD and punctuation
    /// caches reset and the ring is cleared.
    ExplicitStop,
}

/// Merged session settings, built up from control messages.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub mode: Mode,
    /// Frames per incremental decode step.
    pub chunk_interval: u32,
    /// Session label echoed in result records.
    pub wav_name: String,
    pub is_speaking: bool,
    pub decoder: DecoderSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            chunk_interval: defaults::CHUNK_INTERVAL,
            wav_name: defaults::WAV_NAME.to_string(),
            is_speaking: true,
            decoder: DecoderSettings::default(),
        }
    }
}

impl SessionSettings {
    /// Merge a partial control message into the current settings.
    ///
    /// Unset fields retain their prior value.
    fn apply(&mut self, msg: &ControlMessage) -> Result<()> {
        if let Some(interval) = msg.chunk_interval {
            if interval == 0 {
                return Err(VoxError::ConfigInvalidValue {
                    key: "chunk_interval".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            self.chunk_interval = interval;
        }
        if let Some(mode) = msg.mode {
            self.mode = mode;
        }
        if let Some(ref wav_name) = msg.wav_name {
            self.wav_name = wav_name.clone();
        }
        if let Some(is_speaking) = msg.is_speaking {
            self.is_speaking = is_speaking;
        }
        if let Some(chunk_size) = msg.chunk_size {
            self.decoder.chunk_size = chunk_size;
        }
        if let Some(look_back) = msg.encoder_chunk_look_back {
            self.decoder.encoder_chunk_look_back = look_back;
        }
        if let Some(look_back) = msg.decoder_chunk_look_back {
            self.decoder.decoder_chunk_look_back = look_back;
        }
        if let Some(ref hotwords) = msg.hotwords {
            self.decoder.hotwords = hotwords.clone();
        }
        if let Some(itn) = msg.itn {
            self.decoder.itn = itn;
        }
        Ok(())
    }
}

/// Per-connection recognition state machine.
pub struct RecognitionSession {
    engines: Engines,
    /// None until the first control message arrives; frames are rejected
    /// until then.
    settings: Option<SessionSettings>,

    frame_ring: VecDeque<Vec<i16>>,
    ring_depth: usize,
    speech_frames: Vec<Vec<i16>>,
    online_window: Vec<Vec<i16>>,

    vad_cache: VadCache,
    online_cache: DecoderCache,
    offline_cache: DecoderCache,
    punct_cache: PunctCache,

    speaking: bool,
    /// Total samples received, for converting VAD offsets to ring look-back.
    stream_samples: u64,
    /// Samples in the most recent frame.
    samples_per_frame: usize,
}

impl RecognitionSession {
    /// Creates a session with the default ring depth.
    pub fn new(engines: Engines) -> Self {
        Self::with_ring_depth(engines, defaults::RING_DEPTH_FRAMES)
    }

    /// Creates a session with a custom pre-roll ring depth in frames.
    pub fn with_ring_depth(engines: Engines, ring_depth: usize) -> Self {
        Self {
            engines,
            settings: None,
            frame_ring: VecDeque::with_capacity(ring_depth + 1),
            ring_depth,
            speech_frames: Vec::new(),
            online_window: Vec::new(),
            vad_cache: VadCache::default(),
            online_cache: DecoderCache::default(),
            offline_cache: DecoderCache::default(),
            punct_cache: PunctCache::default(),
            speaking: false,
            stream_samples: 0,
            samples_per_frame: defaults::SAMPLES_PER_FRAME,
        }
    }

    /// True once the first control message has been applied.
    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    /// True between a detected/declared speech start and end.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Frames currently held as pre-roll candidates.
    pub fn ring_len(&self) -> usize {
        self.frame_ring.len()
    }

    /// Apply a control message, merging partial updates into the current
    /// settings. Returns any result records the update triggered.
    ///
    /// `is_speaking=false` finalizes the open utterance immediately, even if
    /// the detector has not independently seen an end. The effect is
    /// edge-triggered: subsequent frames are processed normally and a new
    /// utterance may open without a further control message.
    pub fn apply_control(&mut self, msg: &ControlMessage) -> Result<Vec<ResultRecord>> {
        let was_configured = self.settings.is_some();
        let mut settings = self.settings.take().unwrap_or_default();
        match settings.apply(msg) {
            Ok(()) => self.settings = Some(settings),
            Err(e) => {
                // A rejected first message leaves the session unconfigured;
                // frames stay rejected until a valid message arrives.
                if was_configured {
                    self.settings = Some(settings);
                }
                return Err(e);
            }
        }

        if msg.is_speaking == Some(false) {
            return Ok(self.finalize_utterance(EndReason::ExplicitStop));
        }
        Ok(Vec::new())
    }

    /// Process one inbound audio frame, returning records to emit.
    ///
    /// Rejects frames until a control message has configured the session.
    pub fn push_frame(&mut self, samples: &[i16]) -> Result<Vec<ResultRecord>> {
        let Some(settings) = self.settings.as_ref() else {
            return Err(VoxError::SessionNotConfigured);
        };
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let mode = settings.mode;
        let chunk_interval = settings.chunk_interval as usize;

        self.samples_per_frame = samples.len();
        self.stream_samples += samples.len() as u64;
        self.frame_ring.push_back(samples.to_vec());
        while self.frame_ring.len() > self.ring_depth {
            self.frame_ring.pop_front();
        }

        let mut records = Vec::new();

        self.online_window.push(samples.to_vec());
        if self.online_window.len() >= chunk_interval {
            if mode.runs_online() {
                if let Some(record) = self.incremental_step(false) {
                    records.push(record);
                }
            } else {
                // The window still drains at the interval when no incremental
                // pass consumes it; otherwise a long silent stream grows it
                // without bound.
                self.online_window.clear();
            }
        }

        if self.speaking {
            self.speech_frames.push(samples.to_vec());
        }

        let outcome = match self.engines.vad.detect(samples, &mut self.vad_cache) {
            Ok(segments) => VadOutcome::from_segments(&segments),
            Err(e) => {
                // Engine failure: the frame counts as inconclusive and the
                // session continues.
                eprintln!("VAD failed, frame treated as inconclusive: {}", e);
                VadOutcome::INCONCLUSIVE
            }
        };

        // End processing takes priority over a start in the same call,
        // avoiding zero-length utterances.
        if outcome.speech_end != -1 {
            records.extend(self.finalize_utterance(EndReason::VadBoundary));
        } else if outcome.speech_start != -1 && !self.speaking {
            self.begin_utterance(outcome.speech_start);
        }

        Ok(records)
    }

    /// Transition to Speaking, seeding the utterance with pre-roll audio.
    ///
    /// The detector reports starts retroactively; the ring supplies the
    /// frames between the reported start offset and now, bounded by ring
    /// depth, so an utterance start never loses more than the ring's depth
    /// of audio.
    fn begin_utterance(&mut self, start_offset: i64) {
        self.speaking = true;

        let samples_per_frame = self.samples_per_frame.max(1) as u64;
        let elapsed = self.stream_samples.saturating_sub(start_offset.max(0) as u64);
        let beg_bias = elapsed.div_ceil(samples_per_frame) as usize;
        let take = beg_bias.min(self.frame_ring.len());

        self.speech_frames = self
            .frame_ring
            .iter()
            .skip(self.frame_ring.len() - take)
            .cloned()
            .collect();
    }

    /// Close the open utterance: flush the incremental pass, run the final
    /// pass, emit the final record, and reset state.
    ///
    /// State is reset even when an engine call fails, so a failed
    /// finalization can never leave the session stuck in Speaking.
    fn finalize_utterance(&mut self, reason: EndReason) -> Vec<ResultRecord> {
        let (mode, wav_name, decoder) = match &self.settings {
            Some(s) => (s.mode, s.wav_name.clone(), s.decoder.clone()),
            None => return Vec::new(),
        };

        let mut records = Vec::new();

        // Flush the pending online window immediately rather than waiting for
        // the interval. In 2pass mode the flush keeps decoder continuity but
        // is not emitted; the offline pass supersedes it. In online mode the
        // flush is the utterance's final record.
        if mode.runs_online() {
            if let Some(record) = self.incremental_step(true) {
                records.push(record);
            } else if mode == Mode::Online {
                // Even a failed or empty flush marks completion.
                records.push(ResultRecord {
                    mode: mode.result_tag(true).to_string(),
                    text: String::new(),
                    wav_name: wav_name.clone(),
                    is_final: true,
                });
            }
        }

        if mode.runs_offline() {
            let audio: Vec<i16> = self.speech_frames.concat();
            let text = match self
                .engines
                .offline
                .recognize(&audio, &decoder, &mut self.offline_cache)
            {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("Final recognition failed, utterance dropped: {}", e);
                    String::new()
                }
            };
            let text = self.punctuate(text);
            records.push(ResultRecord {
                mode: mode.result_tag(true).to_string(),
                text,
                wav_name,
                is_final: true,
            });
        }

        // Atomic reset relative to frame ingestion: the next frame starts
        // from a clean Listening state.
        self.speech_frames.clear();
        self.online_window.clear();
        self.online_cache.reset();
        self.speaking = false;

        if reason == EndReason::ExplicitStop {
            self.vad_cache.reset();
            self.punct_cache.reset();
            self.frame_ring.clear();
            self.stream_samples = 0;
        }

        records
    }

    /// Run one incremental decode over the accumulated window.
    ///
    /// Emits nothing for empty text (unless this is the final flush in
    /// online mode, which always yields the utterance's final record) and
    /// nothing for 2pass final flushes.
    fn incremental_step(&mut self, final_pass: bool) -> Option<ResultRecord> {
        let settings = self.settings.as_ref()?;
        let mode = settings.mode;
        let wav_name = settings.wav_name.clone();
        let decoder = settings.decoder.clone();

        let audio: Vec<i16> = std::mem::take(&mut self.online_window).concat();
        self.online_cache.is_final = final_pass;

        let text = match self
            .engines
            .online
            .recognize(&audio, &decoder, &mut self.online_cache)
        {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Incremental recognition failed, window skipped: {}", e);
                return None;
            }
        };

        if mode == Mode::TwoPass && final_pass {
            return None;
        }

        let is_final = final_pass && mode == Mode::Online;
        if text.is_empty() && !is_final {
            return None;
        }

        Some(ResultRecord {
            mode: mode.result_tag(is_final).to_string(),
            text,
            wav_name,
            is_final,
        })
    }

    /// Apply punctuation restoration to final-pass text, if configured.
    fn punctuate(&mut self, text: String) -> String {
        if text.is_empty() {
            return text;
        }
        let Some(punctuator) = &self.engines.punctuator else {
            return text;
        };
        match punctuator.punctuate(&text, &mut self.punct_cache) {
            Ok(punctuated) => punctuated,
            Err(e) => {
                eprintln!("Punctuation failed, emitting raw text: {}", e);
                text
            }
        }
    }
}
