//! Command-line interface for voxstream
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Real-time streaming speech-to-text over WebSocket
#[derive(Parser, Debug)]
#[command(
    name = "voxstream",
    version,
    about = "Real-time streaming speech-to-text over WebSocket"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress partial results (final utterances only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream audio to a recognition server and print results (default)
    Listen {
        /// Server host
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Server port
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Recognition mode: online, offline or 2pass
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,

        /// Audio input device (e.g., hw:0); default picks the best available
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Stream a WAV file instead of the microphone
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Space-separated bias phrases for the final recognizer
        #[arg(long, value_name = "WORDS")]
        hotwords: Option<String>,
    },

    /// Run the recognition server
    Serve {
        /// Listen address
        #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:10095")]
        bind: String,
    },

    /// List available audio input devices
    Devices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["voxstream"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_listen_flags() {
        let cli = Cli::try_parse_from([
            "voxstream",
            "listen",
            "--host",
            "asr.internal",
            "--port",
            "8080",
            "--mode",
            "offline",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Listen {
                host, port, mode, ..
            }) => {
                assert_eq!(host.as_deref(), Some("asr.internal"));
                assert_eq!(port, Some(8080));
                assert_eq!(mode.as_deref(), Some("offline"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_default_bind() {
        let cli = Cli::try_parse_from(["voxstream", "serve"]).unwrap();
        match cli.command {
            Some(Commands::Serve { bind }) => assert_eq!(bind, "0.0.0.0:10095"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_listen_file_input() {
        let cli = Cli::try_parse_from(["voxstream", "listen", "--file", "speech.wav"]).unwrap();
        match cli.command {
            Some(Commands::Listen { file, .. }) => {
                assert_eq!(file, Some(PathBuf::from("speech.wav")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_quiet_after_subcommand() {
        let cli = Cli::try_parse_from(["voxstream", "listen", "--quiet"]).unwrap();
        assert!(cli.quiet);
    }
}
