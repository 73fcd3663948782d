use clap::Parser;
use std::path::PathBuf;

use crate::audio::analysis::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};

pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 800;

#[derive(Parser, Debug)]
#[command(name = "barscope", about = "Real-time bar spectrum of system audio")]
pub struct Cli {
    /// Config file (defaults to ./barscope.toml, then ~/.config/barscope/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture device name or part of it. Defaults to a monitor/loopback source
    #[arg(short, long)]
    pub device: Option<String>,

    /// Samples per FFT (power of two, 32-32768); half as many bars are drawn
    #[arg(long, default_value_t = DEFAULT_FFT_SIZE)]
    pub fft_size: usize,

    /// Smoothing between consecutive spectra (0.0-1.0)
    #[arg(long, default_value_t = DEFAULT_SMOOTHING)]
    pub smoothing: f32,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = DEFAULT_WINDOW_WIDTH)]
    pub width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = DEFAULT_WINDOW_HEIGHT)]
    pub height: u32,

    /// Open in borderless fullscreen
    #[arg(long)]
    pub fullscreen: bool,

    /// Start capturing immediately instead of waiting for Space
    #[arg(long)]
    pub autostart: bool,

    /// List capture devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_without_arguments() {
        let cli = Cli::parse_from(["barscope"]);
        assert_eq!(cli.fft_size, 512);
        assert_eq!(cli.smoothing, 0.8);
        assert_eq!((cli.width, cli.height), (1280, 800));
        assert!(cli.device.is_none());
        assert!(!cli.autostart && !cli.fullscreen && !cli.list_devices);
    }

    #[test]
    fn parses_capture_flags() {
        let cli = Cli::parse_from([
            "barscope",
            "--device",
            "monitor",
            "--fft-size",
            "2048",
            "--autostart",
            "--fullscreen",
        ]);
        assert_eq!(cli.device.as_deref(), Some("monitor"));
        assert_eq!(cli.fft_size, 2048);
        assert!(cli.autostart && cli.fullscreen);
    }
}
