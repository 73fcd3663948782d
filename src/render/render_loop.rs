//! Frame-driven render loop.
//!
//! The loop never calls itself. A [`FrameScheduler`] hands out one-shot frame
//! handles; whoever owns the scheduler dispatches a handle back through
//! [`RenderLoop::on_frame`], which paints and requests the next frame.

use super::bars::{paint_frame, BarStyle};
use super::canvas::Canvas;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    /// Register a one-shot callback for the next repaint.
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraw a registration that has not been dispatched yet.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Provider of the per-frame magnitude snapshot.
pub trait SpectrumSource {
    fn snapshot(&mut self) -> &[u8];
}

pub struct RenderLoop<C: Canvas, S: FrameScheduler> {
    canvas: C,
    scheduler: S,
    style: BarStyle,
    running: bool,
    pending: Option<FrameHandle>,
    frames_painted: u64,
}

impl<C: Canvas, S: FrameScheduler> RenderLoop<C, S> {
    pub fn new(canvas: C, scheduler: S, style: BarStyle) -> Self {
        Self {
            canvas,
            scheduler,
            style,
            running: false,
            pending: None,
            frames_painted: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.pending = Some(self.scheduler.request_frame());
    }

    /// Cancel the pending frame. The last painted frame stays on the canvas.
    pub fn stop(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.running = false;
    }

    /// Layout is derived from the canvas size on every frame, so nothing else
    /// needs invalidating.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_size(width, height);
    }

    /// Run the frame registered under `handle`.
    ///
    /// Returns `false` without painting when the loop is stopped or the handle
    /// is not the one currently pending.
    pub fn on_frame<Src: SpectrumSource + ?Sized>(&mut self, handle: FrameHandle, source: &mut Src) -> bool {
        if !self.running || self.pending != Some(handle) {
            return false;
        }
        self.pending = None;

        paint_frame(&mut self.canvas, source.snapshot(), &self.style);
        self.frames_painted += 1;

        self.pending = Some(self.scheduler.request_frame());
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Scheduler whose frames fire only when the test dispatches them.
    #[derive(Default)]
    pub struct QueueScheduler {
        next: u64,
        queue: VecDeque<FrameHandle>,
        pub cancelled: Vec<FrameHandle>,
    }

    impl QueueScheduler {
        pub fn queued(&self) -> usize {
            self.queue.len()
        }

        pub fn dispatch(&mut self) -> Option<FrameHandle> {
            self.queue.pop_front()
        }
    }

    impl FrameScheduler for QueueScheduler {
        fn request_frame(&mut self) -> FrameHandle {
            self.next += 1;
            let handle = FrameHandle(self.next);
            self.queue.push_back(handle);
            handle
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            self.queue.retain(|h| *h != handle);
            self.cancelled.push(handle);
        }
    }

    /// Source replaying a fixed magnitude sequence, one entry per frame.
    pub struct ScriptedSource {
        frames: Vec<Vec<u8>>,
        current: Vec<u8>,
        pub reads: usize,
    }

    impl ScriptedSource {
        pub fn new(frames: Vec<Vec<u8>>) -> Self {
            Self {
                frames,
                current: Vec::new(),
                reads: 0,
            }
        }
    }

    impl SpectrumSource for ScriptedSource {
        fn snapshot(&mut self) -> &[u8] {
            if !self.frames.is_empty() {
                let idx = self.reads.min(self.frames.len() - 1);
                self.current.clone_from(&self.frames[idx]);
            }
            self.reads += 1;
            &self.current
        }
    }
}
