mod app;
mod audio;
mod cli;
mod config;
mod error;
mod render;
mod viewport;
mod visualizer;

use anyhow::{Context, Result};
use clap::Parser;
use winit::event_loop::EventLoop;

use app::App;
use audio::capture::CaptureBackend;
use audio::cpal_backend::CpalBackend;
use cli::Cli;
use config::{Config, Settings};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect barscope.toml / global config
    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("{:#}", err);
                Config::default()
            }
        },
        None => Config::default(),
    };

    if cli.list_devices {
        let backend = CpalBackend::new(None);
        let devices = backend.devices();
        if devices.is_empty() {
            println!("No capture devices found");
        } else {
            println!("Capture devices:");
            for device in &devices {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("  {}{}", device.name, marker);
            }
        }
        return Ok(());
    }

    let settings = Settings::resolve(&cli, config);
    if let Err(msg) = settings.validate() {
        anyhow::bail!("Invalid configuration: {}", msg);
    }

    log::info!("barscope - real-time audio spectrum");
    log::info!(
        "FFT size: {} ({} bars), smoothing {}",
        settings.analyser.fft_size,
        settings.analyser.frequency_bin_count(),
        settings.analyser.smoothing
    );
    if let Some(ref device) = settings.device {
        log::info!("Requested capture device: {}", device);
    }

    let event_loop = EventLoop::new().context("Failed to create the event loop")?;
    let mut app = App::new(settings);
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated abnormally")?;
    app.finish()
}
