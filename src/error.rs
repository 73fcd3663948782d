use thiserror::Error;

/// Boxed cause carried by capture failures.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced when starting a visualization.
///
/// Every variant is recoverable: the controller shows the message and the
/// user may try again.
#[derive(Debug, Error)]
pub enum VisualizerError {
    /// The capture was granted but carries no audio track.
    #[error("No audio track available. Please ensure you selected a device that shares system audio")]
    NoAudioTrack,

    /// The host cannot provide the audio capture or analysis we need.
    #[error("Your platform does not support the required audio features: {0}")]
    UnsupportedPlatform(String),

    /// The capture request was refused, cancelled or otherwise failed.
    #[error("Failed to capture system audio: {0}")]
    Capture(#[source] Cause),
}

impl VisualizerError {
    pub fn capture(cause: impl Into<Cause>) -> Self {
        Self::Capture(cause.into())
    }
}
