//! Wire protocol for the streaming recognition service.
//!
//! The transport is a persistent WebSocket carrying a text+binary message mix:
//! - Client→server text frames are JSON [`ControlMessage`]s.
//! - Client→server binary frames are raw PCM16LE mono 16kHz audio.
//! - Server→client text frames are JSON [`ResultRecord`]s.
//!
//! Message boundaries are preserved end to end: one message = one send = one
//! receive, with no internal re-chunking.

use crate::error::{Result, VoxError};
use serde::{Deserialize, Serialize};

/// Recognition operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mode {
    /// Incremental recognition only; partials are emitted as audio arrives.
    #[serde(rename = "online")]
    Online,
    /// Final recognition only; one result per utterance, no partials.
    #[serde(rename = "offline")]
    Offline,
    /// Both passes: incremental partials plus an authoritative final pass.
    #[serde(rename = "2pass")]
    #[default]
    TwoPass,
}

impl Mode {
    /// Whether this mode runs the incremental recognizer.
    pub fn runs_online(self) -> bool {
        matches!(self, Mode::Online | Mode::TwoPass)
    }

    /// Whether this mode runs the final recognizer at utterance end.
    pub fn runs_offline(self) -> bool {
        matches!(self, Mode::Offline | Mode::TwoPass)
    }

    /// The `mode` string reported in result records.
    ///
    /// 2pass sessions tag results with the pass that produced them so the
    /// client can filter on `"2pass-offline"` for authoritative text.
    pub fn result_tag(self, is_final: bool) -> &'static str {
        match (self, is_final) {
            (Mode::Online, _) => "online",
            (Mode::Offline, _) => "offline",
            (Mode::TwoPass, false) => "2pass-online",
            (Mode::TwoPass, true) => "2pass-offline",
        }
    }
}

/// Session settings sent by the client, once at session start and again
/// whenever a setting changes mid-session.
///
/// Every field is optional on any given message; unset fields retain their
/// prior value on the server. The first message must establish a usable set,
/// which the serde defaults below guarantee even for an empty `{}` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControlMessage {
    /// Operating mode for the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Encoder lookback window: frames before / current / frames after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<[u32; 3]>,
    /// Frames per incremental decode step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder_chunk_look_back: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_chunk_look_back: Option<u32>,
    /// Session label echoed back in every result record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wav_name: Option<String>,
    /// `false` declares end-of-utterance regardless of VAD state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_speaking: Option<bool>,
    /// Space-separated bias phrases forwarded to the final recognizer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotwords: Option<String>,
    /// Inverse text normalization (digits, dates) in final output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itn: Option<bool>,
}

impl ControlMessage {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// A control message declaring end-of-utterance.
    pub fn end_of_utterance() -> Self {
        Self {
            is_speaking: Some(false),
            ..Self::default()
        }
    }
}

/// Recognition result sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Mode tag: `online`, `offline`, `2pass-online` or `2pass-offline`.
    pub mode: String,
    /// Recognized text. Empty for a completion marker with no speech.
    pub text: String,
    /// Session label from the control message.
    pub wav_name: String,
    /// True only for final-pass output; exactly one per completed utterance.
    pub is_final: bool,
}

impl ResultRecord {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Decode a binary wire frame (PCM16LE mono) into samples.
///
/// Rejects odd-length payloads rather than silently dropping the trailing
/// byte; a truncated frame indicates a framing bug upstream.
pub fn decode_pcm_frame(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(VoxError::Protocol {
            message: format!("odd-length audio frame ({} bytes)", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode samples into a binary wire frame (PCM16LE mono).
pub fn encode_pcm_frame(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
