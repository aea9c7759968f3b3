//! Tunnel Backdrop - an endless brick tunnel rendered behind everything else on screen

mod animation;
mod background;
mod config;
mod surface;

use anyhow::Result;
use background::{RunningTunnel, TunnelBackground};
use config::BackdropConfig;
use engine_core::{FrameScheduler, ResizeSignal, Time, Viewport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use renderer::Renderer;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

const TITLE: &str = "Tunnel Backdrop";

/// Frame requests become winit redraw requests. The shared flag lets the event
/// loop ignore redraws the tunnel did not ask for (expose events after teardown).
struct WindowScheduler {
    window: Arc<Window>,
    pending: Rc<Cell<bool>>,
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) {
        self.pending.set(true);
        self.window.request_redraw();
    }

    fn cancel_frames(&mut self) {
        self.pending.set(false);
    }
}

/// Application handler for winit.
struct App {
    config: BackdropConfig,
    resize: ResizeSignal,
    time: Time,
    frame_pending: Rc<Cell<bool>>,
    tunnel: Option<RunningTunnel<Renderer, WindowScheduler>>,
}

impl App {
    fn new(config: BackdropConfig) -> Self {
        Self {
            config,
            resize: ResizeSignal::new(),
            time: Time::new(),
            frame_pending: Rc::new(Cell::new(false)),
            tunnel: None,
        }
    }

    /// Create the surface, generate the tunnel and start it. Any failure here is fatal.
    fn mount(&mut self, window: Arc<Window>) -> Result<()> {
        let mut renderer = pollster::block_on(Renderer::new(window.clone(), self.config.vsync))?;

        let settings = &self.config.tunnel;
        let depth = settings.params().total_depth();
        renderer.set_fog(depth * 0.35, depth * 0.95, settings.fog_color);

        let mut rng = match self.config.seed {
            Some(seed) => {
                log::info!("Using tunnel seed {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        let scheduler = WindowScheduler {
            window: window.clone(),
            pending: self.frame_pending.clone(),
        };
        let mut background = TunnelBackground::generate(settings, &mut rng, renderer, scheduler)?;

        if let Some(path) = &self.config.export_texture {
            let written = surface::brick_image(&background.texture().image)
                .and_then(|img| Ok(img.save(path)?));
            match written {
                Ok(()) => log::info!("Brick texture written to {:?}", path),
                Err(e) => log::warn!("Could not export brick texture to {:?}: {}", path, e),
            }
        }

        let size = window.inner_size();
        background.set_viewport(Viewport::new(size.width, size.height));

        let ready_window = window.clone();
        self.time = Time::new();
        self.tunnel = Some(background.start(&self.resize, move || {
            ready_window.set_title(TITLE);
            log::info!("Tunnel ready");
        }));
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(tunnel) = self.tunnel.take() {
            tunnel.stop();
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if !self.frame_pending.replace(false) {
            return;
        }
        let Some(tunnel) = self.tunnel.as_mut() else {
            return;
        };

        self.time.update();
        if let Err(e) = tunnel.frame(self.time.elapsed()) {
            log::error!("Rendering failed: {:#}", e);
            self.shutdown(event_loop);
            return;
        }

        if self.time.frame_count() % 600 == 0 {
            log::debug!(
                "{} frames, {:.1} fps ({:.2} ms)",
                self.time.frame_count(),
                self.time.fps(),
                self.time.delta_seconds() * 1000.0
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.tunnel.is_some() {
            return;
        }

        // The title doubles as the loading indicator until the first frame.
        let window_attrs = Window::default_attributes()
            .with_title(format!("{} (loading)", TITLE))
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.mount(window) {
            log::error!("Failed to initialize tunnel: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                self.resize.emit(Viewport::new(size.width, size.height));
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BackdropConfig::load();
    log::info!(
        "Starting {}: {} walls x {} rows, row width {}",
        TITLE,
        config.tunnel.walls,
        config.tunnel.rows,
        config.tunnel.row_width
    );

    let event_loop = EventLoop::new()?;
    // Frames are paced by redraw requests; nothing else needs polling.
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
