//! Tunnel lifecycle: build once, run per frame, tear down on request.
//!
//! `TunnelBackground::start` consumes the built tunnel and hands back a
//! [`RunningTunnel`]. That handle is the only way to drive frames, and stopping
//! it (or dropping it) cancels frame requests, detaches the resize listener and
//! releases the surface.

use crate::animation::Animator;
use crate::config::TunnelConfig;
use crate::surface::{instance_data, RenderSurface};
use anyhow::Result;
use engine_core::{FrameScheduler, ListenerId, RandomSource, ResizeSignal, Vec3, Viewport};
use procgen::{BrickTexture, BrickTextureGenerator, TunnelScene};
use renderer::Camera;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Scene, camera and surface, shared between the frame path and the resize listener.
struct Stage<S> {
    scene: TunnelScene,
    camera: Camera,
    surface: S,
}

/// A fully generated tunnel that has not started animating.
pub struct TunnelBackground<S: RenderSurface + 'static, F: FrameScheduler> {
    texture: BrickTexture,
    scene: TunnelScene,
    camera: Camera,
    animator: Animator,
    surface: S,
    scheduler: F,
}

impl<S: RenderSurface + 'static, F: FrameScheduler> TunnelBackground<S, F> {
    /// Generate the brick texture, build the scene from it and install the material.
    pub fn generate(
        settings: &TunnelConfig,
        rng: &mut dyn RandomSource,
        mut surface: S,
        scheduler: F,
    ) -> Result<Self> {
        let texture = BrickTextureGenerator::new(settings.texture_config()).generate(rng);
        let scene = TunnelScene::build(&settings.params(), &texture, rng);
        surface.set_material(&texture.image)?;

        let camera = Camera {
            fov_degrees: settings.fov_degrees,
            far: scene.total_depth() * 2.0,
            ..Camera::new(Vec3::ZERO)
        };

        Ok(Self {
            texture,
            scene,
            camera,
            animator: settings.animator(),
            surface,
            scheduler,
        })
    }

    pub fn texture(&self) -> &BrickTexture {
        &self.texture
    }

    pub fn scene(&self) -> &TunnelScene {
        &self.scene
    }

    /// Match the camera to the initial viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.camera.set_aspect(viewport.width, viewport.height);
    }

    /// Begin animating. `on_ready` runs once, at the start of the first frame.
    pub fn start(
        self,
        resize: &ResizeSignal,
        on_ready: impl FnOnce() + 'static,
    ) -> RunningTunnel<S, F> {
        let stage = Rc::new(RefCell::new(Stage {
            scene: self.scene,
            camera: self.camera,
            surface: self.surface,
        }));

        let listener_stage = Rc::clone(&stage);
        let listener = resize.subscribe(move |viewport| {
            if viewport.is_empty() {
                return;
            }
            let mut stage = listener_stage.borrow_mut();
            stage.camera.set_aspect(viewport.width, viewport.height);
            stage.surface.resize(viewport);
        });

        let mut scheduler = self.scheduler;
        scheduler.request_frame();
        log::info!("Tunnel animation started");

        RunningTunnel {
            stage,
            animator: self.animator,
            scheduler,
            resize: resize.clone(),
            listener: Some(listener),
            on_ready: Some(Box::new(on_ready)),
            frames: 0,
            state: LoopState::Running,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Handle to an animating tunnel. Dropping it performs the same teardown as `stop`.
pub struct RunningTunnel<S: RenderSurface + 'static, F: FrameScheduler> {
    stage: Rc<RefCell<Stage<S>>>,
    animator: Animator,
    scheduler: F,
    resize: ResizeSignal,
    listener: Option<ListenerId>,
    on_ready: Option<Box<dyn FnOnce()>>,
    frames: u64,
    state: LoopState,
}

impl<S: RenderSurface + 'static, F: FrameScheduler> RunningTunnel<S, F> {
    /// One display refresh: spin, advance rows, render, ask for the next tick.
    pub fn frame(&mut self, elapsed: Duration) -> Result<()> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }

        if let Some(on_ready) = self.on_ready.take() {
            on_ready();
        }

        {
            let mut stage = self.stage.borrow_mut();
            let stage = &mut *stage;
            self.animator.apply(&mut stage.scene, elapsed);
            let instances = instance_data(&stage.scene);
            stage.surface.render(&stage.camera, &instances)?;
        }

        self.frames += 1;
        self.scheduler.request_frame();
        Ok(())
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Inspect the scene between frames.
    pub fn with_scene<R>(&self, f: impl FnOnce(&TunnelScene) -> R) -> R {
        f(&self.stage.borrow().scene)
    }

    /// Stop animating and release everything the tunnel holds on the host.
    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.scheduler.cancel_frames();
        if let Some(id) = self.listener.take() {
            self.resize.unsubscribe(id);
        }
        self.stage.borrow_mut().surface.release();
        log::info!("Tunnel stopped after {} frames", self.frames);
    }
}

impl<S: RenderSurface + 'static, F: FrameScheduler> Drop for RunningTunnel<S, F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::ManualFrameScheduler;
    use procgen::TextureData;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use renderer::InstanceData;
    use std::cell::Cell;

    #[derive(Debug, Default)]
    struct SurfaceLog {
        materials: usize,
        renders: usize,
        resizes: Vec<Viewport>,
        releases: usize,
        last_instances: usize,
        last_aspect: f32,
    }

    #[derive(Clone, Default)]
    struct MockSurface {
        log: Rc<RefCell<SurfaceLog>>,
    }

    impl RenderSurface for MockSurface {
        fn set_material(&mut self, _texture: &TextureData) -> Result<()> {
            self.log.borrow_mut().materials += 1;
            Ok(())
        }

        fn resize(&mut self, viewport: Viewport) {
            self.log.borrow_mut().resizes.push(viewport);
        }

        fn render(&mut self, camera: &Camera, instances: &[InstanceData]) -> Result<()> {
            let mut log = self.log.borrow_mut();
            log.renders += 1;
            log.last_instances = instances.len();
            log.last_aspect = camera.aspect;
            Ok(())
        }

        fn release(&mut self) {
            self.log.borrow_mut().releases += 1;
        }
    }

    struct Harness {
        surface: MockSurface,
        scheduler: ManualFrameScheduler,
        resize: ResizeSignal,
    }

    fn build(seed: u64) -> (Harness, TunnelBackground<MockSurface, ManualFrameScheduler>) {
        let harness = Harness {
            surface: MockSurface::default(),
            scheduler: ManualFrameScheduler::new(),
            resize: ResizeSignal::new(),
        };
        let background = TunnelBackground::generate(
            &TunnelConfig::default(),
            &mut StdRng::seed_from_u64(seed),
            harness.surface.clone(),
            harness.scheduler.clone(),
        )
        .unwrap();
        (harness, background)
    }

    /// Deliver frames the way a host would: only when one was requested.
    fn pump(
        harness: &Harness,
        running: &mut RunningTunnel<MockSurface, ManualFrameScheduler>,
        frames: u64,
        start_ms: u64,
    ) {
        for i in 0..frames {
            if !harness.scheduler.take_pending() {
                break;
            }
            running.frame(Duration::from_millis(start_ms + i * 16)).unwrap();
        }
    }

    #[test]
    fn reference_tunnel_shape() {
        let (harness, background) = build(1);
        let scene = background.scene();
        assert_eq!(scene.wall_count(), 5);
        assert_eq!(scene.rows_per_wall(), 24);
        assert!(scene.walls().iter().all(|w| w.rows.len() == 24));
        assert_eq!(scene.box_count(), background.texture().layout.segment_count());
        assert_eq!(harness.surface.log.borrow().materials, 1);

        let box_count = scene.box_count();
        let mut running = background.start(&harness.resize, || {});
        pump(&harness, &mut running, 1, 0);
        assert_eq!(harness.surface.log.borrow().last_instances, box_count);
    }

    #[test]
    fn ready_fires_once_on_first_frame() {
        let (harness, background) = build(2);
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let mut running = background.start(&harness.resize, move || counter.set(counter.get() + 1));

        assert_eq!(fired.get(), 0);
        assert!(harness.scheduler.is_pending());
        pump(&harness, &mut running, 10, 0);
        assert_eq!(fired.get(), 1);
        assert_eq!(running.frames(), 10);
        assert_eq!(harness.surface.log.borrow().renders, 10);
    }

    #[test]
    fn rows_stay_in_range_while_running() {
        let (harness, background) = build(3);
        let mut running = background.start(&harness.resize, || {});
        pump(&harness, &mut running, 2_000, 0);
        let total = running.with_scene(|s| s.total_depth());
        assert!(running.with_scene(|s| s.row_depths().all(|d| (0.0..total).contains(&d))));
    }

    #[test]
    fn resize_updates_camera_and_surface() {
        let (harness, mut background) = build(4);
        background.set_viewport(Viewport::new(800, 600));
        let mut running = background.start(&harness.resize, || {});

        pump(&harness, &mut running, 1, 0);
        assert!((harness.surface.log.borrow().last_aspect - 800.0 / 600.0).abs() < 1e-5);

        assert_eq!(harness.resize.emit(Viewport::new(1920, 1080)), 1);
        pump(&harness, &mut running, 1, 16);
        let log = harness.surface.log.borrow();
        assert_eq!(log.resizes, vec![Viewport::new(1920, 1080)]);
        assert!((log.last_aspect - 16.0 / 9.0).abs() < 1e-5);
    }

    #[test]
    fn minimised_window_is_ignored() {
        let (harness, background) = build(5);
        let _running = background.start(&harness.resize, || {});
        harness.resize.emit(Viewport::new(0, 0));
        assert!(harness.surface.log.borrow().resizes.is_empty());
    }

    #[test]
    fn stop_ends_frames_and_detaches_resize() {
        let (harness, background) = build(6);
        let mut running = background.start(&harness.resize, || {});
        pump(&harness, &mut running, 5, 0);
        assert_eq!(harness.resize.listener_count(), 1);

        running.stop();

        assert!(!harness.scheduler.is_pending());
        assert_eq!(harness.scheduler.cancel_count(), 1);
        assert_eq!(harness.resize.listener_count(), 0);
        assert_eq!(harness.resize.emit(Viewport::new(640, 480)), 0);

        let log = harness.surface.log.borrow();
        assert_eq!(log.renders, 5);
        assert!(log.resizes.is_empty());
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn drop_tears_down_once() {
        let (harness, background) = build(7);
        let running = background.start(&harness.resize, || {});
        assert_eq!(running.state(), LoopState::Running);
        drop(running);
        assert_eq!(harness.resize.listener_count(), 0);
        assert_eq!(harness.surface.log.borrow().releases, 1);
        assert_eq!(harness.scheduler.cancel_count(), 1);
    }

    #[test]
    fn same_seed_builds_same_tunnel() {
        let (_, a) = build(42);
        let (_, b) = build(42);
        assert_eq!(a.texture().layout, b.texture().layout);
        assert_eq!(a.scene().box_count(), b.scene().box_count());
        let ia = a.scene().instances();
        let ib = b.scene().instances();
        assert!(ia.iter().zip(&ib).all(|(x, y)| x.model.abs_diff_eq(y.model, 1e-6)));
    }
}
