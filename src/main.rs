use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use voxstream::audio::source::{FrameSource, FrameSourceConfig};
use voxstream::audio::wav::WavFrameSource;
use voxstream::cli::{Cli, Commands};
use voxstream::client::{ConnectionManager, ResultSink};
use voxstream::config::Config;
use voxstream::engine::Engines;
use voxstream::output;
use voxstream::protocol::Mode;
use voxstream::server::Dispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => {
            // Bare invocation: stream from the default microphone.
            run_listen(config, None, None, None, None, None, None, cli.quiet).await?;
        }
        Some(Commands::Listen {
            host,
            port,
            mode,
            device,
            file,
            hotwords,
        }) => {
            run_listen(config, host, port, mode, device, file, hotwords, cli.quiet).await?;
        }
        Some(Commands::Serve { bind }) => {
            run_serve(&config, &bind).await?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxstream/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

#[allow(clippy::too_many_arguments)]
async fn run_listen(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<String>,
    device: Option<String>,
    file: Option<std::path::PathBuf>,
    hotwords: Option<String>,
    quiet: bool,
) -> Result<()> {
    if let Some(host) = host {
        config.connection.host = host;
    }
    if let Some(port) = port {
        config.connection.port = port;
    }
    if let Some(mode) = mode {
        config.session.mode = parse_mode(&mode)?;
    }
    if let Some(device) = device {
        config.audio.device = Some(device);
    }
    if hotwords.is_some() {
        config.session.hotwords = hotwords;
    }

    let mut sink = ResultSink::new();
    if !quiet {
        sink.on_partial(|record| output::render_partial(record));
    }
    sink.on_utterance(move |record| output::render_final(record));

    let connection = config.connection_config();
    let control = config.control_message();
    let source_config = FrameSourceConfig {
        sample_rate: config.audio.sample_rate,
        chunk_ms: config.audio.chunk_ms,
    };

    eprintln!(
        "{} {}",
        "Streaming to".dimmed(),
        connection.url().dimmed()
    );

    match file {
        Some(path) => {
            let source = WavFrameSource::open(&path, source_config)?;
            eprintln!(
                "{}",
                format!("Input: {} ({}ms)", path.display(), source.duration_ms()).dimmed()
            );
            stream(connection, control, source, Arc::new(sink)).await
        }
        None => {
            #[cfg(feature = "cpal-audio")]
            {
                let source = voxstream::audio::capture::CpalFrameSource::new(
                    config.audio.device.as_deref(),
                    source_config,
                )?;
                stream(connection, control, source, Arc::new(sink)).await
            }
            #[cfg(not(feature = "cpal-audio"))]
            {
                anyhow::bail!(
                    "microphone capture not compiled in; use --file or rebuild with the cpal-audio feature"
                );
            }
        }
    }
}

/// Run the manager until the source is exhausted or Ctrl-C is pressed.
async fn stream<S: FrameSource + 'static>(
    connection: voxstream::client::ConnectionConfig,
    control: voxstream::protocol::ControlMessage,
    source: S,
    sink: Arc<ResultSink>,
) -> Result<()> {
    let manager = ConnectionManager::new(connection, control, source, sink);
    let handle = manager.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::clear_line();
            eprintln!("Stopping...");
            handle.stop();
        }
    });

    manager.run().await?;
    Ok(())
}

async fn run_serve(config: &Config, bind: &str) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(Engines::stub_with_vad(config.vad_config())));
    let (listener, address) = Dispatcher::bind(bind).await?;
    eprintln!("{} {}", "Listening on".green(), address);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    dispatcher.serve(listener, shutdown_rx).await?;
    Ok(())
}

fn parse_mode(s: &str) -> Result<Mode> {
    match s {
        "online" => Ok(Mode::Online),
        "offline" => Ok(Mode::Offline),
        "2pass" => Ok(Mode::TwoPass),
        other => anyhow::bail!("unknown mode '{}' (expected online, offline or 2pass)", other),
    }
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    #[cfg(feature = "cpal-audio")]
    {
        let devices = voxstream::audio::capture::list_devices()?;

        if devices.is_empty() {
            eprintln!("No audio input devices found");
            std::process::exit(1);
        }

        println!("Available audio input devices:");
        for (idx, device) in devices.iter().enumerate() {
            println!("  [{}] {}", idx, device);
        }

        Ok(())
    }
    #[cfg(not(feature = "cpal-audio"))]
    {
        anyhow::bail!("audio capture not compiled in; rebuild with the cpal-audio feature");
    }
}
