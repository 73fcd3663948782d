//! Real-time frequency analysis with byte-frequency-data semantics.
//!
//! The analyser keeps the most recent `fft_size` mono samples, applies a
//! Blackman window, runs a forward FFT and maps the smoothed magnitudes onto a
//! decibel range scaled to `0..=255`.

use std::sync::{Arc, Mutex, MutexGuard};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const DEFAULT_FFT_SIZE: usize = 512;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Analyser configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    /// Samples per transform; yields `fft_size / 2` bins.
    pub fft_size: usize,
    /// Time smoothing constant in `0.0..=1.0`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

impl AnalyserOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two()
            || self.fft_size < MIN_FFT_SIZE
            || self.fft_size > MAX_FFT_SIZE
        {
            return Err(format!(
                "fft_size must be a power of two between {} and {}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, self.fft_size
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(format!(
                "smoothing must be within 0.0..=1.0, got {}",
                self.smoothing
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            ));
        }
        Ok(())
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

struct History {
    samples: Vec<f32>,
    write: usize,
    /// Why the capture feeding this history stopped, once it has.
    ended: Option<String>,
}

/// Time-domain history shared between the capture callback and the analyser.
///
/// The capture thread pushes mono samples; the analyser copies the latest
/// window out under the same lock.
#[derive(Clone)]
pub struct SampleTap {
    inner: Arc<Mutex<History>>,
}

impl SampleTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(History {
                samples: vec![0.0; capacity.max(1)],
                write: 0,
                ended: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        // A panicking capture callback must not take the render thread down.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn push(&self, samples: &[f32]) {
        let mut history = self.lock();
        if history.ended.is_some() {
            return;
        }
        let len = history.samples.len();
        for &sample in samples {
            let write = history.write;
            history.samples[write] = sample;
            history.write = (write + 1) % len;
        }
    }

    /// Downmix interleaved frames to mono and push them.
    pub fn push_frames<T>(&self, data: &[T], channels: usize, to_f32: impl Fn(&T) -> f32) {
        let channels = channels.max(1);
        let mut history = self.lock();
        if history.ended.is_some() {
            return;
        }
        let len = history.samples.len();
        for frame in data.chunks(channels) {
            let mono = frame.iter().map(&to_f32).sum::<f32>() / frame.len() as f32;
            let write = history.write;
            history.samples[write] = mono;
            history.write = (write + 1) % len;
        }
    }

    /// Mark the capture as gone. The history reads as silence from now on and
    /// later pushes are dropped.
    pub fn end(&self, reason: impl Into<String>) {
        let mut history = self.lock();
        history.samples.fill(0.0);
        history.ended.get_or_insert_with(|| reason.into());
    }

    /// The reason given to [`end`](Self::end), if the capture has ended.
    pub fn end_reason(&self) -> Option<String> {
        self.lock().ended.clone()
    }

    /// Copy the history in chronological order into the real parts of `out`.
    fn copy_latest(&self, out: &mut [Complex<f32>]) {
        let history = self.lock();
        let len = history.samples.len();
        let (newer, older) = history.samples.split_at(history.write);
        for (slot, &sample) in out.iter_mut().zip(older.iter().chain(newer)).take(len) {
            *slot = Complex::new(sample, 0.0);
        }
    }
}

pub struct Analyser {
    options: AnalyserOptions,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    tap: SampleTap,
}

impl Analyser {
    pub fn new(options: AnalyserOptions) -> Self {
        let size = options.fft_size;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            options,
            fft,
            window: blackman_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            smoothed: vec![0.0; options.frequency_bin_count()],
            tap: SampleTap::new(size),
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.options.frequency_bin_count()
    }

    /// Why the capture behind this analyser ended, if it has.
    pub fn capture_ended(&self) -> Option<String> {
        self.tap.end_reason()
    }

    /// Handle the capture side writes samples into.
    pub fn tap(&self) -> SampleTap {
        self.tap.clone()
    }

    /// Fill `out` with the current magnitudes, one byte per bin.
    ///
    /// Writes `min(out.len(), frequency_bin_count())` entries and never
    /// allocates.
    pub fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        self.tap.copy_latest(&mut self.buffer);
        for (sample, w) in self.buffer.iter_mut().zip(&self.window) {
            sample.re *= w;
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / self.options.fft_size as f32;
        let tau = self.options.smoothing;
        let min_db = self.options.min_decibels;
        let range = self.options.max_decibels - min_db;

        for ((byte, smoothed), bin) in out
            .iter_mut()
            .zip(self.smoothed.iter_mut())
            .zip(self.buffer.iter())
        {
            let magnitude = bin.norm() * scale;
            let mut value = tau * *smoothed + (1.0 - tau) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            *smoothed = value;

            let db = 20.0 * value.log10();
            let scaled = 255.0 / range * (db - min_db);
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
