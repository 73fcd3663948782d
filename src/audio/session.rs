use crate::audio::analysis::{Analyser, AnalyserOptions};
use crate::audio::capture::{CaptureBackend, CaptureConstraints, CaptureStream};
use crate::error::VisualizerError;
use crate::render::render_loop::SpectrumSource;

/// Owns one system-audio capture and the analyser reading from it.
///
/// While active, the backend context, the stream and the analyser all exist;
/// after [`release`](Self::release) none of them do. The same session
/// may be initialized again.
pub struct CaptureSession<B: CaptureBackend> {
    backend: B,
    options: AnalyserOptions,
    context: Option<B::Context>,
    stream: Option<B::Stream>,
    analyser: Option<Analyser>,
    source_connected: bool,
    magnitudes: Vec<u8>,
}

impl<B: CaptureBackend> CaptureSession<B> {
    pub fn new(backend: B, options: AnalyserOptions) -> Self {
        Self {
            backend,
            options,
            context: None,
            stream: None,
            analyser: None,
            source_connected: false,
            magnitudes: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.analyser.is_some()
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of magnitudes per snapshot; zero outside an active session.
    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.stream.as_ref().map(|s| s.sample_rate())
    }

    /// Why the capture stopped delivering audio, if it has while active.
    pub fn capture_failure(&self) -> Option<String> {
        self.analyser.as_ref().and_then(Analyser::capture_ended)
    }

    /// Acquire a capture stream and wire it into a fresh analyser.
    ///
    /// Does nothing if already active. On failure everything acquired so far
    /// is released before the error is returned.
    pub fn initialize(&mut self) -> Result<(), VisualizerError> {
        if self.is_active() {
            return Ok(());
        }
        self.release();

        match self.acquire() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.release();
                Err(err)
            }
        }
    }

    fn acquire(&mut self) -> Result<(), VisualizerError> {
        let context = self.context.insert(self.backend.open_context()?);

        let stream = self
            .backend
            .request_capture(context, &CaptureConstraints::raw_system_audio())
            .map_err(VisualizerError::capture)?;
        let stream = self.stream.insert(stream);

        if stream.audio_track_count() == 0 {
            return Err(VisualizerError::NoAudioTrack);
        }

        let analyser = Analyser::new(self.options);
        stream
            .connect(analyser.tap())
            .map_err(VisualizerError::capture)?;
        self.source_connected = true;

        log::info!(
            "Capture started: {}Hz, fft_size={}, {} bins",
            stream.sample_rate(),
            self.options.fft_size,
            analyser.frequency_bin_count()
        );

        self.magnitudes = vec![0; analyser.frequency_bin_count()];
        self.analyser = Some(analyser);
        Ok(())
    }

    /// Refresh the magnitude buffer in place and return it.
    ///
    /// Only meaningful while active; otherwise the returned slice is empty.
    pub fn snapshot(&mut self) -> &[u8] {
        if let Some(analyser) = self.analyser.as_mut() {
            analyser.get_byte_frequency_data(&mut self.magnitudes);
        }
        &self.magnitudes
    }

    /// Tear the capture down. Safe to call at any time, any number of times.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            if self.source_connected {
                stream.disconnect();
            }
        }
        self.source_connected = false;

        if let Some(context) = self.context.take() {
            self.backend.close_context(context);
        }
        self.analyser = None;

        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            log::info!("Capture released");
        }
        self.magnitudes.clear();
    }
}

impl<B: CaptureBackend> SpectrumSource for CaptureSession<B> {
    fn snapshot(&mut self) -> &[u8] {
        CaptureSession::snapshot(self)
    }
}

impl<B: CaptureBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::fake::{FakeBackend, Grant};

    fn session(grant: Grant) -> CaptureSession<FakeBackend> {
        CaptureSession::new(FakeBackend::new(grant), AnalyserOptions::default())
    }

    #[test]
    fn initialize_builds_a_256_bin_snapshot() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();

        assert!(session.is_active());
        assert_eq!(session.bin_count(), 256);
        assert_eq!(session.sample_rate(), Some(48_000));
        assert_eq!(session.snapshot().len(), 256);
        assert!(session.backend().log.borrow().connected);
    }

    #[test]
    fn requests_raw_audio_with_video() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();

        let requests = &session.backend().requests;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], CaptureConstraints::raw_system_audio());
        assert!(requests[0].video && requests[0].audio);
        assert!(!requests[0].echo_cancellation);
        assert!(!requests[0].noise_suppression);
        assert!(!requests[0].auto_gain_control);
    }

    #[test]
    fn snapshot_reads_captured_samples() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();
        assert!(session.snapshot().iter().all(|&m| m == 0));

        let tap = session.backend().log.borrow().tap.clone().unwrap();
        let tone: Vec<f32> = (0..512)
            .map(|n| 0.5 * (2.0 * std::f32::consts::PI * 64.0 * n as f32 / 512.0).sin())
            .collect();
        tap.push(&tone);

        let snapshot = session.snapshot();
        assert!(snapshot[64] > 0);
    }

    #[test]
    fn lost_stream_is_reported_until_release() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();
        assert_eq!(session.capture_failure(), None);

        let tap = session.backend().log.borrow().tap.clone().unwrap();
        tap.end("device vanished");
        assert_eq!(session.capture_failure().as_deref(), Some("device vanished"));

        session.release();
        assert_eq!(session.capture_failure(), None);
    }

    #[test]
    fn initialize_twice_is_a_noop() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();
        session.initialize().unwrap();
        assert_eq!(session.backend().requests.len(), 1);
    }

    #[test]
    fn video_only_grant_is_no_audio_track() {
        let mut session = session(Grant::VideoOnly);
        let err = session.initialize().unwrap_err();

        assert!(matches!(err, VisualizerError::NoAudioTrack));
        assert!(!session.is_active());
        assert!(session.backend().log.borrow().all_stopped());
    }

    #[test]
    fn cancelled_grant_is_a_capture_error() {
        let mut session = session(Grant::Cancelled);
        let err = session.initialize().unwrap_err();

        assert!(matches!(err, VisualizerError::Capture(_)));
        assert!(err.to_string().contains("cancelled"));
        assert!(!session.is_active());
    }

    #[test]
    fn unsupported_host_never_requests_capture() {
        let mut backend = FakeBackend::new(Grant::AudioAndVideo);
        backend.supported = false;
        let mut session = CaptureSession::new(backend, AnalyserOptions::default());

        let err = session.initialize().unwrap_err();
        assert!(matches!(err, VisualizerError::UnsupportedPlatform(_)));
        assert!(session.backend().requests.is_empty());
    }

    #[test]
    fn failed_connect_leaves_no_live_tracks() {
        let mut session = session(Grant::ConnectFails);
        let err = session.initialize().unwrap_err();

        assert!(matches!(err, VisualizerError::Capture(_)));
        let log = session.backend().log.borrow();
        assert_eq!(log.tracks, 2);
        assert!(log.all_stopped());
        assert!(!log.connected);
    }

    #[test]
    fn release_before_initialize_is_harmless() {
        let mut session = session(Grant::AudioAndVideo);
        session.release();
        session.release();
        assert!(!session.is_active());
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn release_twice_stops_all_tracks_once() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();
        session.release();
        session.release();

        let log = session.backend().log.borrow();
        assert!(log.all_stopped());
        assert_eq!(log.disconnects, 1);
        assert!(!log.connected);
        drop(log);
        assert_eq!(session.bin_count(), 0);
    }

    #[test]
    fn session_restarts_after_release() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();
        session.release();
        session.initialize().unwrap();

        assert!(session.is_active());
        assert_eq!(session.backend().requests.len(), 2);
        assert_eq!(session.bin_count(), 256);
    }

    #[test]
    fn every_context_is_closed_exactly_once() {
        let mut session = session(Grant::AudioAndVideo);
        session.initialize().unwrap();
        assert_eq!(session.backend().live_contexts(), 1);

        session.release();
        session.release();
        session.initialize().unwrap();
        session.release();

        let backend = session.backend();
        assert_eq!(backend.contexts_opened, 2);
        assert_eq!(backend.contexts_closed, vec![1, 2]);
    }

    #[test]
    fn failed_initialize_closes_its_context() {
        for grant in [Grant::VideoOnly, Grant::Cancelled, Grant::ConnectFails] {
            let mut session = session(grant);
            assert!(session.initialize().is_err());
            assert_eq!(session.backend().contexts_opened, 1);
            assert_eq!(session.backend().live_contexts(), 0);
        }
    }
}
