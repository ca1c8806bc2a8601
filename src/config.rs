use crate::client::manager::ConnectionConfig;
use crate::defaults;
use crate::engine::vad::EnergyVadConfig;
use crate::protocol::{ControlMessage, Mode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionSection,
    pub audio: AudioSection,
    pub session: SessionSection,
}

/// Recognition service endpoint and retry policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionSection {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub max_retries: u32,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSection {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_ms: u32,
    pub vad_threshold: f32,
}

/// Per-session recognition settings, forwarded in the control message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub mode: Mode,
    pub chunk_size: [u32; 3],
    pub chunk_interval: u32,
    pub encoder_chunk_look_back: u32,
    pub decoder_chunk_look_back: u32,
    pub wav_name: String,
    pub hotwords: Option<String>,
    pub itn: bool,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            tls: false,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
            vad_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            mode: Mode::TwoPass,
            chunk_size: defaults::CHUNK_SIZE,
            chunk_interval: defaults::CHUNK_INTERVAL,
            encoder_chunk_look_back: defaults::ENCODER_CHUNK_LOOK_BACK,
            decoder_chunk_look_back: defaults::DECODER_CHUNK_LOOK_BACK,
            wav_name: defaults::WAV_NAME.to_string(),
            hotwords: None,
            itn: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXSTREAM_HOST → connection.host
    /// - VOXSTREAM_PORT → connection.port
    /// - VOXSTREAM_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("VOXSTREAM_HOST")
            && !host.is_empty()
        {
            self.connection.host = host;
        }

        if let Ok(port) = std::env::var("VOXSTREAM_PORT")
            && let Ok(port) = port.parse()
        {
            self.connection.port = port;
        }

        if let Ok(device) = std::env::var("VOXSTREAM_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Connection parameters derived from this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.connection.host.clone(),
            port: self.connection.port,
            tls: self.connection.tls,
            max_retries: self.connection.max_retries,
            chunk_ms: self.audio.chunk_ms,
            ..ConnectionConfig::default()
        }
    }

    /// The session-opening control message derived from this configuration.
    pub fn control_message(&self) -> ControlMessage {
        ControlMessage {
            mode: Some(self.session.mode),
            chunk_size: Some(self.session.chunk_size),
            chunk_interval: Some(self.session.chunk_interval),
            encoder_chunk_look_back: Some(self.session.encoder_chunk_look_back),
            decoder_chunk_look_back: Some(self.session.decoder_chunk_look_back),
            wav_name: Some(self.session.wav_name.clone()),
            is_speaking: Some(true),
            hotwords: self.session.hotwords.clone(),
            itn: Some(self.session.itn),
        }
    }

    /// Energy VAD tuning derived from this configuration.
    pub fn vad_config(&self) -> EnergyVadConfig {
        EnergyVadConfig {
            speech_threshold: self.audio.vad_threshold,
            ..EnergyVadConfig::default()
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxstream/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("voxstream")
            .join("config.toml")
    }
}
