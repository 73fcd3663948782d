use crate::audio::capture::CaptureBackend;
use crate::audio::session::CaptureSession;
use crate::error::VisualizerError;
use crate::render::canvas::Canvas;
use crate::render::render_loop::{FrameHandle, FrameScheduler, RenderLoop};

/// A capture session paired with the render loop that draws it.
pub struct Visualizer<B, C, S>
where
    B: CaptureBackend,
    C: Canvas,
    S: FrameScheduler,
{
    session: CaptureSession<B>,
    render_loop: RenderLoop<C, S>,
}

impl<B, C, S> Visualizer<B, C, S>
where
    B: CaptureBackend,
    C: Canvas,
    S: FrameScheduler,
{
    pub fn new(session: CaptureSession<B>, render_loop: RenderLoop<C, S>) -> Self {
        Self {
            session,
            render_loop,
        }
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_running()
    }

    /// Acquire the capture and begin drawing. No-op while running.
    pub fn start(&mut self) -> Result<(), VisualizerError> {
        if self.is_running() {
            return Ok(());
        }
        if let Err(err) = self.session.initialize() {
            self.stop();
            return Err(err);
        }
        self.render_loop.start();
        log::info!(
            "Visualizer started: {} bars at {} Hz",
            self.session.bin_count(),
            self.session.sample_rate().unwrap_or(0)
        );
        Ok(())
    }

    /// Halt drawing, then release the capture. Idempotent.
    pub fn stop(&mut self) {
        let was_running = self.render_loop.is_running();
        self.render_loop.stop();
        self.session.release();
        if was_running {
            log::info!(
                "Visualizer stopped after {} frames",
                self.render_loop.frames_painted()
            );
        }
    }

    /// Paint the frame behind `handle`. Returns whether anything was painted.
    ///
    /// If the capture ended underneath a running session, the visualizer
    /// stops and the loss is returned as a capture error.
    pub fn on_frame(&mut self, handle: FrameHandle) -> Result<bool, VisualizerError> {
        if let Some(reason) = self.session.capture_failure() {
            self.stop();
            return Err(VisualizerError::capture(reason));
        }
        Ok(self.render_loop.on_frame(handle, &mut self.session))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Canvas resized to {}x{}", width, height);
        self.render_loop.resize(width, height);
    }

    pub fn canvas(&self) -> &C {
        self.render_loop.canvas()
    }

    #[cfg(test)]
    pub fn session(&self) -> &CaptureSession<B> {
        &self.session
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        self.render_loop.scheduler_mut()
    }
}
