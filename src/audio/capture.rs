//! Host capture ports.
//!
//! A [`CaptureBackend`] opens a host context and grants capture streams
//! within it; a [`CaptureStream`] feeds its first audio track into a
//! [`SampleTap`] once connected.

use crate::audio::analysis::SampleTap;
use crate::error::{Cause, VisualizerError};

/// Capture request. Audio processing is switched off: the visualization
/// wants the raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub video: bool,
    pub audio: bool,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl CaptureConstraints {
    pub fn raw_system_audio() -> Self {
        Self {
            video: true,
            audio: true,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }
}

/// A capture device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    pub name: String,
    pub is_default: bool,
}

pub trait CaptureBackend {
    type Context;
    type Stream: CaptureStream;

    /// Open the host state a capture runs in.
    ///
    /// Fails with [`VisualizerError::UnsupportedPlatform`] when the host
    /// cannot capture at all.
    fn open_context(&mut self) -> Result<Self::Context, VisualizerError>;

    /// Ask the host for a capture stream. May block until the user picks a
    /// source or cancels.
    fn request_capture(
        &mut self,
        context: &Self::Context,
        constraints: &CaptureConstraints,
    ) -> Result<Self::Stream, Cause>;

    /// Give a context back to the host.
    fn close_context(&mut self, context: Self::Context);

    fn devices(&self) -> Vec<CaptureDevice>;
}

pub trait CaptureStream {
    fn audio_track_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Start delivering mono samples of the first audio track into `tap`.
    fn connect(&mut self, tap: SampleTap) -> Result<(), Cause>;

    fn disconnect(&mut self);

    /// Stop every track. Idempotent.
    fn stop_tracks(&mut self);
}
