//! Window, input and presentation around the visualizer.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::audio::cpal_backend::CpalBackend;
use crate::audio::session::CaptureSession;
use crate::config::Settings;
use crate::render::canvas::{Canvas, PixelCanvas};
use crate::render::frame::FramePresenter;
use crate::render::gpu::GpuContext;
use crate::render::render_loop::{FrameHandle, FrameScheduler, RenderLoop};
use crate::viewport::Debouncer;
use crate::visualizer::Visualizer;

const APP_NAME: &str = "barscope";

/// Frame scheduler backed by window redraw requests. At most one frame is
/// pending; a redraw dispatches it.
#[derive(Default)]
pub struct WindowScheduler {
    window: Option<Arc<Window>>,
    next: u64,
    pending: Option<FrameHandle>,
}

impl WindowScheduler {
    pub fn attach(&mut self, window: Arc<Window>) {
        self.window = Some(window);
    }

    /// The frame due on this redraw, if any.
    pub fn take_due(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Stopped,
    Running,
    Failed(String),
}

fn window_title(status: &Status) -> String {
    match status {
        Status::Stopped => format!("{}: stopped (Space to start)", APP_NAME),
        Status::Running => format!("{}: running", APP_NAME),
        Status::Failed(message) => format!("{}: {}", APP_NAME, message),
    }
}

type LiveVisualizer = Visualizer<CpalBackend, PixelCanvas, WindowScheduler>;

pub struct App {
    settings: Settings,
    visualizer: LiveVisualizer,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    presenter: Option<FramePresenter>,
    resize: Debouncer<(u32, u32)>,
    status: Status,
    fatal: Option<anyhow::Error>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let session = CaptureSession::new(
            CpalBackend::new(settings.device.clone()),
            settings.analyser,
        );
        let render_loop = RenderLoop::new(
            PixelCanvas::new(1, 1),
            WindowScheduler::default(),
            settings.style,
        );
        Self {
            resize: Debouncer::new(settings.resize_debounce),
            settings,
            visualizer: Visualizer::new(session, render_loop),
            window: None,
            gpu: None,
            presenter: None,
            status: Status::Stopped,
            fatal: None,
        }
    }

    /// Error that ended the event loop early, if any.
    pub fn finish(self) -> Result<()> {
        match self.fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.settings.window_size;
        let mut attributes = Window::default_attributes()
            .with_title(window_title(&self.status))
            .with_inner_size(LogicalSize::new(width, height));
        if self.settings.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(attributes)?);

        let gpu = GpuContext::new(Arc::clone(&window))?;
        self.presenter = Some(FramePresenter::new(&gpu));
        self.gpu = Some(gpu);

        let size = window.inner_size();
        let (canvas_w, canvas_h) = self.settings.ratios.canvas_size(size.width, size.height);
        self.visualizer.resize(canvas_w, canvas_h);
        self.visualizer.scheduler_mut().attach(Arc::clone(&window));
        self.window = Some(window);

        if self.settings.autostart {
            self.start();
        }
        Ok(())
    }

    fn start(&mut self) {
        self.status = match self.visualizer.start() {
            Ok(()) => Status::Running,
            Err(err) => {
                log::error!("Failed to start visualizer: {}", err);
                Status::Failed(format!("Failed to start visualizer: {}", err))
            }
        };
        self.update_title();
    }

    fn stop(&mut self) {
        self.visualizer.stop();
        self.status = Status::Stopped;
        self.update_title();
    }

    fn toggle(&mut self) {
        if self.visualizer.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    fn update_title(&self) {
        if let Some(ref window) = self.window {
            window.set_title(&window_title(&self.status));
        }
    }

    fn toggle_fullscreen(&self) {
        let Some(ref window) = self.window else {
            return;
        };
        if window.fullscreen().is_some() {
            window.set_fullscreen(None);
        } else {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        match key {
            KeyCode::Space | KeyCode::Enter | KeyCode::NumpadEnter => self.toggle(),
            KeyCode::KeyF | KeyCode::F11 => self.toggle_fullscreen(),
            KeyCode::Escape => {
                let fullscreen = self
                    .window
                    .as_ref()
                    .is_some_and(|w| w.fullscreen().is_some());
                if fullscreen {
                    self.toggle_fullscreen();
                } else {
                    self.visualizer.stop();
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn redraw(&mut self) {
        if let Some(handle) = self.visualizer.scheduler_mut().take_due() {
            if let Err(err) = self.visualizer.on_frame(handle) {
                log::error!("Visualizer stopped: {}", err);
                self.status = Status::Failed(err.to_string());
                self.update_title();
            }
        }

        let (Some(gpu), Some(presenter)) = (self.gpu.as_ref(), self.presenter.as_mut()) else {
            return;
        };
        let canvas = self.visualizer.canvas();
        if let Err(err) = presenter.present(gpu, canvas.pixels(), canvas.width(), canvas.height()) {
            log::error!("Failed to present frame: {:#}", err);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_window(event_loop) {
            self.fatal = Some(err.context("Failed to open the visualizer window"));
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.visualizer.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut gpu) = self.gpu {
                    gpu.resize(size.width, size.height);
                }
                let canvas_size = self.settings.ratios.canvas_size(size.width, size.height);
                self.resize.push(canvas_size, Instant::now());
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(key),
                        repeat: false,
                        ..
                    },
                ..
            } => self.on_key(event_loop, key),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some((width, height)) = self.resize.poll(Instant::now()) {
            self.visualizer.resize(width, height);
            if let Some(ref window) = self.window {
                window.request_redraw();
            }
        }
        match self.resize.deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.resize.cancel();
        self.visualizer.stop();
    }
}
