use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::analysis::{
    AnalyserOptions, DEFAULT_FFT_SIZE, DEFAULT_MAX_DECIBELS, DEFAULT_MIN_DECIBELS,
    DEFAULT_SMOOTHING,
};
use crate::cli::{Cli, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH};
use crate::render::bars::BarStyle;
use crate::render::canvas::Rgba;
use crate::viewport::{ViewportRatios, DEFAULT_RESIZE_DEBOUNCE};

const CONFIG_FILE: &str = "barscope.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub bars: BarsConfig,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_width_ratio")]
    pub width_ratio: f64,
    #[serde(default = "default_height_ratio")]
    pub height_ratio: f64,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default)]
    pub fullscreen: bool,
}

/// Bar appearance. Missing keys keep the stock look.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BarsConfig {
    pub bar_width_ratio: f32,
    pub max_height_ratio: f32,
    pub fade_alpha: f32,
    pub line_count: usize,
    pub line_alpha: f32,
    pub line_height: f32,
    pub gradient_start: Rgba,
    pub gradient_end: Rgba,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            width_ratio: default_width_ratio(),
            height_ratio: default_height_ratio(),
            resize_debounce_ms: default_resize_debounce_ms(),
            fullscreen: false,
        }
    }
}

impl Default for BarsConfig {
    fn default() -> Self {
        let style = BarStyle::default();
        Self {
            bar_width_ratio: style.bar_width_ratio,
            max_height_ratio: style.max_height_ratio,
            fade_alpha: style.fade_alpha,
            line_count: style.line_count,
            line_alpha: style.line_alpha,
            line_height: style.line_height,
            gradient_start: style.gradient_start,
            gradient_end: style.gradient_end,
        }
    }
}

impl BarsConfig {
    pub fn style(&self) -> BarStyle {
        BarStyle {
            bar_width_ratio: self.bar_width_ratio,
            max_height_ratio: self.max_height_ratio,
            fade_alpha: self.fade_alpha,
            line_count: self.line_count,
            line_alpha: self.line_alpha,
            line_height: self.line_height,
            gradient_start: self.gradient_start,
            gradient_end: self.gradient_end,
        }
    }
}

fn default_fft_size() -> usize { DEFAULT_FFT_SIZE }
fn default_smoothing() -> f32 { DEFAULT_SMOOTHING }
fn default_min_decibels() -> f32 { DEFAULT_MIN_DECIBELS }
fn default_max_decibels() -> f32 { DEFAULT_MAX_DECIBELS }
fn default_window_width() -> u32 { DEFAULT_WINDOW_WIDTH }
fn default_window_height() -> u32 { DEFAULT_WINDOW_HEIGHT }
fn default_width_ratio() -> f64 { ViewportRatios::default().width }
fn default_height_ratio() -> f64 { ViewportRatios::default().height }
fn default_resize_debounce_ms() -> u64 { DEFAULT_RESIZE_DEBOUNCE.as_millis() as u64 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// `--config`, else `./barscope.toml`, else `~/.config/barscope/config.toml`,
/// else the platform config directory.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("barscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("barscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Everything the app needs after merging the command line with the config
/// file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub analyser: AnalyserOptions,
    pub device: Option<String>,
    pub style: BarStyle,
    pub ratios: ViewportRatios,
    pub resize_debounce: Duration,
    pub window_size: (u32, u32),
    pub fullscreen: bool,
    pub autostart: bool,
}

impl Settings {
    /// Config values apply only where the command line is still at its
    /// default.
    pub fn resolve(cli: &Cli, config: Config) -> Self {
        let Config {
            capture,
            display,
            bars,
        } = config;

        let fft_size = if cli.fft_size == DEFAULT_FFT_SIZE {
            capture.fft_size
        } else {
            cli.fft_size
        };
        let smoothing = if cli.smoothing == DEFAULT_SMOOTHING {
            capture.smoothing
        } else {
            cli.smoothing
        };
        let width = if cli.width == DEFAULT_WINDOW_WIDTH {
            display.window_width
        } else {
            cli.width
        };
        let height = if cli.height == DEFAULT_WINDOW_HEIGHT {
            display.window_height
        } else {
            cli.height
        };

        Self {
            analyser: AnalyserOptions {
                fft_size,
                smoothing,
                min_decibels: capture.min_decibels,
                max_decibels: capture.max_decibels,
            },
            device: cli.device.clone().or(capture.device),
            style: bars.style(),
            ratios: ViewportRatios {
                width: display.width_ratio,
                height: display.height_ratio,
            },
            resize_debounce: Duration::from_millis(display.resize_debounce_ms),
            window_size: (width, height),
            fullscreen: cli.fullscreen || display.fullscreen,
            autostart: cli.autostart,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.analyser.validate()?;
        let ratio_ok = |r: f64| r > 0.0 && r <= 1.0;
        if !ratio_ok(self.ratios.width) || !ratio_ok(self.ratios.height) {
            return Err(format!(
                "display ratios must be within (0, 1], got {}x{}",
                self.ratios.width, self.ratios.height
            ));
        }
        if !(0.0..=1.0).contains(&self.style.fade_alpha) {
            return Err(format!(
                "fade_alpha must be within 0.0..=1.0, got {}",
                self.style.fade_alpha
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn empty_file_matches_the_stock_look() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bars.style(), BarStyle::default());
        assert_eq!(config.capture.fft_size, 512);
        assert_eq!(config.display.resize_debounce_ms, 250);
        assert_eq!(config.display.width_ratio, 0.9);
    }

    #[test]
    fn reads_all_sections() {
        let config: Config = toml::from_str(
            r##"
[capture]
device = "Monitor of Built-in Audio"
fft_size = 1024
smoothing = 0.5

[display]
width_ratio = 1.0
resize_debounce_ms = 100

[bars]
line_count = 3
gradient_start = "#ff0000"
"##,
        )
        .unwrap();

        assert_eq!(config.capture.device.as_deref(), Some("Monitor of Built-in Audio"));
        assert_eq!(config.capture.fft_size, 1024);
        assert_eq!(config.capture.min_decibels, -100.0);
        assert_eq!(config.display.width_ratio, 1.0);
        assert_eq!(config.display.height_ratio, 0.7);

        let style = config.bars.style();
        assert_eq!(style.line_count, 3);
        assert_eq!(style.gradient_start, Rgba::opaque(255, 0, 0));
        assert_eq!(style.gradient_end, BarStyle::default().gradient_end);
    }

    #[test]
    fn rejects_malformed_colours() {
        let result: Result<Config, _> = toml::from_str("[bars]\ngradient_end = \"cyan\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn command_line_wins_over_config() {
        let config: Config = toml::from_str(
            "[capture]\nfft_size = 4096\ndevice = \"from-file\"\n[display]\nwindow_width = 640\n",
        )
        .unwrap();
        let cli = Cli::parse_from(["barscope", "--fft-size", "1024", "--device", "from-cli"]);

        let settings = Settings::resolve(&cli, config);
        assert_eq!(settings.analyser.fft_size, 1024);
        assert_eq!(settings.device.as_deref(), Some("from-cli"));
        assert_eq!(settings.window_size, (640, 800));
    }

    #[test]
    fn config_fills_defaults_left_on_the_command_line() {
        let config: Config = toml::from_str("[capture]\nfft_size = 4096\n").unwrap();
        let cli = Cli::parse_from(["barscope"]);

        let settings = Settings::resolve(&cli, config);
        assert_eq!(settings.analyser.fft_size, 4096);
        assert_eq!(settings.resize_debounce, Duration::from_millis(250));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validation_catches_bad_values() {
        let cli = Cli::parse_from(["barscope", "--fft-size", "1000"]);
        assert!(Settings::resolve(&cli, Config::default()).validate().is_err());

        let config: Config = toml::from_str("[display]\nwidth_ratio = 1.5\n").unwrap();
        let cli = Cli::parse_from(["barscope"]);
        assert!(Settings::resolve(&cli, config).validate().is_err());
    }
}
