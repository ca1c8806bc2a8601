//! Inference engine interfaces consumed by the recognition server.
//!
//! Engines are shared, re-entrant services: one instance serves every
//! connection, with per-session continuity held in session-owned cache
//! objects ([`vad::VadCache`], [`recognizer::DecoderCache`],
//! [`punctuate::PunctCache`]) passed explicitly on each call. No global
//! mutable recognition state exists, so sessions need no cross-session
//! locking.

pub mod punctuate;
pub mod recognizer;
pub mod vad;

use punctuate::Punctuator;
use recognizer::{FinalRecognizer, IncrementalRecognizer, StubRecognizer};
use std::sync::Arc;
use vad::{EnergyVad, VoiceActivityDetector};

/// The engine set shared by all recognition sessions.
#[derive(Clone)]
pub struct Engines {
    pub vad: Arc<dyn VoiceActivityDetector>,
    pub online: Arc<dyn IncrementalRecognizer>,
    pub offline: Arc<dyn FinalRecognizer>,
    /// Optional: final-pass text is emitted raw when absent.
    pub punctuator: Option<Arc<dyn Punctuator>>,
}

impl Engines {
    /// Engine set with the built-in energy VAD and stub recognizers.
    ///
    /// Runnable out of the box but recognizes nothing; deployments swap in
    /// real recognizer backends here.
    pub fn stub() -> Self {
        Self::stub_with_vad(vad::EnergyVadConfig::default())
    }

    /// Like [`Engines::stub`], with a tuned energy VAD.
    pub fn stub_with_vad(config: vad::EnergyVadConfig) -> Self {
        Self {
            vad: Arc::new(EnergyVad::with_config(config)),
            online: Arc::new(StubRecognizer),
            offline: Arc::new(StubRecognizer),
            punctuator: Some(Arc::new(punctuate::RulePunctuator)),
        }
    }
}
