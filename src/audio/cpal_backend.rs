//! Capture backend on top of `cpal`.
//!
//! System audio is reached through whatever the host exposes: a PulseAudio or
//! PipeWire monitor source, a loopback device, or WASAPI loopback on the
//! default output device. A host with none of these gets no capture at all
//! rather than the microphone.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};

use crate::audio::analysis::SampleTap;
use crate::audio::capture::{CaptureBackend, CaptureConstraints, CaptureDevice, CaptureStream};
use crate::error::{Cause, VisualizerError};

const NO_SYSTEM_SOURCE: &str = "no monitor or loopback source found; \
    pass --device with a monitor source (see --list-devices)";

pub struct CpalBackend {
    host: cpal::Host,
    device_name: Option<String>,
}

/// Devices enumerated when a capture is opened.
pub struct HostContext {
    devices: Vec<(String, cpal::Device)>,
    input_names: Vec<String>,
}

impl HostContext {
    fn device(&self, name: &str) -> Option<cpal::Device> {
        self.devices
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.clone())
    }
}

/// Where system audio is read from when no device is configured.
#[derive(Debug, PartialEq, Eq)]
enum SystemSource {
    /// An input device that carries what the speakers play.
    Input(String),
    /// Loopback capture on the default output device.
    OutputLoopback,
}

/// A monitor-like input wins; otherwise output loopback where the host
/// supports it. Plain inputs are never picked: they are microphones.
fn system_source(input_names: &[String], output_loopback: bool) -> Option<SystemSource> {
    if let Some(name) = input_names.iter().find(|n| is_loopback_name(n)) {
        return Some(SystemSource::Input(name.clone()));
    }
    output_loopback.then_some(SystemSource::OutputLoopback)
}

/// Whether input streams on an output device record what it plays.
#[cfg(target_os = "windows")]
fn host_has_output_loopback(host: &cpal::Host) -> bool {
    host.id() == cpal::HostId::Wasapi
}

#[cfg(not(target_os = "windows"))]
fn host_has_output_loopback(_host: &cpal::Host) -> bool {
    false
}

impl CpalBackend {
    /// Backend on the default host. `device_name` pins a device by name.
    pub fn new(device_name: Option<String>) -> Self {
        let host = cpal::default_host();
        log::debug!("Audio host: {:?}", host.id());
        Self { host, device_name }
    }

    /// The device to capture from, and whether it is an output in loopback.
    fn pick_device(&self, context: &HostContext) -> Result<(cpal::Device, bool), Cause> {
        let output_loopback = host_has_output_loopback(&self.host);

        if let Some(ref wanted) = self.device_name {
            let device = context
                .devices
                .iter()
                .find(|(n, _)| matches_device_name(n, wanted))
                .map(|(_, d)| d.clone())
                .ok_or_else(|| format!("capture device '{}' not found", wanted))?;
            return Ok((device, output_loopback));
        }

        match system_source(&context.input_names, output_loopback) {
            Some(SystemSource::Input(name)) => context
                .device(&name)
                .map(|d| (d, false))
                .ok_or_else(|| format!("capture device '{}' disappeared", name).into()),
            Some(SystemSource::OutputLoopback) => self
                .host
                .default_output_device()
                .map(|d| (d, true))
                .ok_or_else(|| "no default output device to loop back".into()),
            None => Err(NO_SYSTEM_SOURCE.into()),
        }
    }
}

impl CaptureBackend for CpalBackend {
    type Context = HostContext;
    type Stream = CpalStream;

    fn open_context(&mut self) -> Result<HostContext, VisualizerError> {
        let unsupported = |e: cpal::DevicesError| VisualizerError::UnsupportedPlatform(e.to_string());
        let devices: Vec<(String, cpal::Device)> = self
            .host
            .devices()
            .map_err(unsupported)?
            .filter_map(|d| d.name().ok().map(|n| (n, d)))
            .collect();
        if devices.is_empty() {
            return Err(VisualizerError::UnsupportedPlatform(format!(
                "audio host {:?} exposes no devices",
                self.host.id()
            )));
        }
        let input_names = self
            .host
            .input_devices()
            .map_err(unsupported)?
            .filter_map(|d| d.name().ok())
            .collect();

        log::debug!("Audio host {:?} opened with {} devices", self.host.id(), devices.len());
        Ok(HostContext {
            devices,
            input_names,
        })
    }

    fn request_capture(
        &mut self,
        context: &HostContext,
        constraints: &CaptureConstraints,
    ) -> Result<CpalStream, Cause> {
        if !constraints.audio {
            return Err("capture request without audio".into());
        }
        let (device, loopback) = self.pick_device(context)?;
        let name = device.name().unwrap_or_else(|_| "<unnamed>".into());

        // Loopback on an output device uses the output format.
        let config = if loopback {
            device
                .default_input_config()
                .or_else(|_| device.default_output_config())
                .ok()
        } else {
            device.default_input_config().ok()
        };
        match config {
            Some(ref c) => log::info!(
                "Capture device: {} ({} Hz, {} ch, {:?})",
                name,
                c.sample_rate().0,
                c.channels(),
                c.sample_format()
            ),
            None => log::warn!("Capture device {} offers no input format", name),
        }

        Ok(CpalStream {
            device,
            name,
            config,
            stream: None,
        })
    }

    fn close_context(&mut self, context: HostContext) {
        log::debug!(
            "Audio host {:?} closed, {} devices released",
            self.host.id(),
            context.devices.len()
        );
    }

    fn devices(&self) -> Vec<CaptureDevice> {
        let default_in = self.host.default_input_device().and_then(|d| d.name().ok());
        let default_out = self.host.default_output_device().and_then(|d| d.name().ok());

        let Ok(devices) = self.host.devices() else {
            return Vec::new();
        };
        devices
            .filter_map(|d| d.name().ok())
            .map(|name| CaptureDevice {
                is_default: default_in.as_ref() == Some(&name)
                    || default_out.as_ref() == Some(&name),
                name,
            })
            .collect()
    }
}

pub struct CpalStream {
    device: cpal::Device,
    name: String,
    config: Option<cpal::SupportedStreamConfig>,
    stream: Option<cpal::Stream>,
}

impl CaptureStream for CpalStream {
    fn audio_track_count(&self) -> usize {
        usize::from(self.config.is_some())
    }

    fn sample_rate(&self) -> u32 {
        self.config.as_ref().map_or(0, |c| c.sample_rate().0)
    }

    fn connect(&mut self, tap: SampleTap) -> Result<(), Cause> {
        let config = self.config.as_ref().ok_or("device has no audio track")?;
        let channels = config.channels() as usize;
        let stream_config: cpal::StreamConfig = config.config();
        let name = self.name.clone();

        macro_rules! input_stream {
            ($sample:ty) => {{
                let data_tap = tap.clone();
                let error_tap = tap.clone();
                let name = name.clone();
                self.device.build_input_stream(
                    &stream_config,
                    move |data: &[$sample], _: &cpal::InputCallbackInfo| {
                        data_tap.push_frames(data, channels, |s: &$sample| f32::from_sample(*s));
                    },
                    move |err| on_stream_error(&error_tap, &name, err),
                    None,
                )?
            }};
        }

        let stream = match config.sample_format() {
            SampleFormat::F32 => input_stream!(f32),
            SampleFormat::F64 => input_stream!(f64),
            SampleFormat::I16 => input_stream!(i16),
            SampleFormat::U16 => input_stream!(u16),
            SampleFormat::I32 => input_stream!(i32),
            SampleFormat::U8 => input_stream!(u8),
            other => return Err(format!("unsupported sample format {:?}", other).into()),
        };
        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(ref stream) = self.stream {
            if let Err(err) = stream.pause() {
                log::debug!("Pausing capture on {} failed: {}", self.name, err);
            }
        }
    }

    fn stop_tracks(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Capture on {} stopped", self.name);
        }
        self.config = None;
    }
}

/// A vanished device ends the capture; anything else is logged and the
/// stream keeps running.
fn on_stream_error(tap: &SampleTap, device: &str, err: cpal::StreamError) {
    match err {
        cpal::StreamError::DeviceNotAvailable => {
            log::error!("Capture device {} is no longer available", device);
            tap.end(format!("capture device {} is no longer available", device));
        }
        other => log::warn!("Audio stream error on {}: {}", device, other),
    }
}

/// Exact name, or a case-insensitive substring of it.
fn matches_device_name(candidate: &str, wanted: &str) -> bool {
    candidate == wanted || candidate.to_lowercase().contains(&wanted.to_lowercase())
}

/// Names hosts give to sources that carry what the speakers play.
fn is_loopback_name(name: &str) -> bool {
    let name = name.to_lowercase();
    ["monitor", "loopback", "stereo mix", "what u hear"]
        .iter()
        .any(|hint| name.contains(hint))
}
