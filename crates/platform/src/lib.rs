//! Platform layer: window, event loop and the per-frame driver.
//!
//! Each redraw polls the pending mesh load, refreshes the transform state,
//! lets the coordinator record the frame and hands it to the GPU backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use asset::{MeshData, MeshSlot, texture::CubeMapData};
use corelib::{
    InputController, ShadingMode, TransformState, Vec3, ViewerKey, transform::Transform,
};
use renderer::{
    DrawTarget, FrameQueue, GpuState, LightParams, MaterialParams, RenderCoordinator,
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

/// Half-size of the environment cube around the origin.
const SKYBOX_HALF: f32 = 50.0;

/// Everything the viewer needs at startup.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub backends: wgpu::Backends,
    pub show_fps: bool,
    pub width: u32,
    pub height: u32,
    pub mesh_path: PathBuf,
    /// Directory holding `pos-x.png` .. `neg-z.png`; `None` for a generated sky.
    pub skybox_dir: Option<PathBuf>,
    pub mode: Option<ShadingMode>,
    /// Largest half-extent of the mesh after recentring.
    pub mesh_half_size: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            show_fps: false,
            width: 1280,
            height: 720,
            mesh_path: PathBuf::from("assets/cube.obj"),
            skybox_dir: None,
            mode: Some(ShadingMode::default()),
            mesh_half_size: 2.0,
        }
    }
}

/// Physical key to viewer action.
pub fn map_key(code: KeyCode) -> Option<ViewerKey> {
    match code {
        KeyCode::KeyA => Some(ViewerKey::YawLeft),
        KeyCode::KeyD => Some(ViewerKey::YawRight),
        KeyCode::ArrowUp => Some(ViewerKey::OrbitUp),
        KeyCode::ArrowDown => Some(ViewerKey::OrbitDown),
        KeyCode::Digit1 => Some(ViewerKey::Select(ShadingMode::Reflective)),
        KeyCode::Digit2 => Some(ViewerKey::Select(ShadingMode::Refractive)),
        KeyCode::Digit3 => Some(ViewerKey::Select(ShadingMode::PhongWireframe)),
        _ => None,
    }
}

/// Frames per second averaged over one-second windows.
#[derive(Debug)]
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self { frames: 0, since: now }
    }

    fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.duration_since(self.since);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = now;
        Some(fps)
    }
}

struct ViewerApp {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    slot: MeshSlot,
    skybox: MeshData,
    transforms: TransformState,
    input: InputController,
    coordinator: RenderCoordinator,
    queue: FrameQueue,
    light: LightParams,
    material: MaterialParams,
    fps: FpsCounter,
    fatal: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(config: ViewerConfig) -> Result<Self> {
        let mut slot = MeshSlot::new();
        slot.request(config.mesh_path.clone())
            .with_context(|| format!("start loading {}", config.mesh_path.display()))?;

        let skybox = MeshData::cube(SKYBOX_HALF).context("build skybox cube")?;
        let input = InputController::new(config.mode);

        Ok(Self {
            config,
            window: None,
            gpu: None,
            slot,
            skybox,
            transforms: TransformState::default(),
            input,
            coordinator: RenderCoordinator::new(),
            queue: FrameQueue::new(),
            light: LightParams::default(),
            material: MaterialParams::default(),
            fps: FpsCounter::new(Instant::now()),
            fatal: None,
        })
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let env = match &self.config.skybox_dir {
            Some(dir) => CubeMapData::load_dir(dir),
            None => CubeMapData::procedural(asset::texture::DEFAULT_FACE_SIZE),
        };
        let mut gpu = pollster::block_on(GpuState::new(window, self.config.backends, &env))?;
        gpu.upload_mesh(DrawTarget::Skybox, &self.skybox);
        self.gpu = Some(gpu);
        Ok(())
    }

    /// Pick up a finished mesh load: upload it and recentre it.
    fn poll_mesh(&mut self) {
        let Some(outcome) = self.slot.poll() else {
            return;
        };
        match outcome {
            Ok(()) => {
                let mesh = self.slot.mesh();
                log::info!(
                    "Mesh ready: {} vertices, {} faces, {} triangles ({} lines skipped)",
                    mesh.vertex_count(),
                    mesh.face_count(),
                    mesh.triangle_count(),
                    mesh.skipped_lines()
                );
                if let Some((scale, offset)) = mesh.canonical_transform(self.config.mesh_half_size)
                {
                    let base = Transform::canonical(scale, Vec3::from(offset)).matrix();
                    self.transforms.set_base_model(base);
                }
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.upload_mesh(DrawTarget::Mesh, mesh);
                }
            }
            Err(err) => log::error!("Mesh load failed: {err}"),
        }
    }

    fn redraw(&mut self) {
        self.poll_mesh();
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        self.transforms.begin_frame(gpu.aspect());
        self.queue.clear();
        let rendered = self.coordinator.render_frame(
            &mut self.queue,
            &mut self.transforms,
            self.slot.mesh(),
            &self.skybox,
            self.input.mode(),
            &self.light,
            &self.material,
        );
        if let Err(err) = rendered {
            log::error!("Frame {} dropped: {err}", self.coordinator.frames());
            return;
        }

        match gpu.present(&self.queue) {
            Ok(()) => {}
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated: {e:?}. Recreating...");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface timeout, skipping frame");
            }
            Err(e) => {
                log::error!("Surface error: {e:?}");
            }
        }

        if self.config.show_fps {
            if let Some(fps) = self.fps.tick(Instant::now()) {
                log::info!("FPS: {fps:.1}");
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode, state: ElementState) {
        let Some(key) = map_key(code) else {
            return;
        };
        match state {
            ElementState::Pressed => self.input.key_down(key, &mut self.transforms),
            ElementState::Released => self.input.key_up(key),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("Mesh Viewer")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fatal = Some(anyhow::anyhow!("Failed to create window: {e}"));
                event_loop.exit();
                return;
            }
        };
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        if let Err(e) = self.init_gpu(window.clone()) {
            self.fatal = Some(e.context("GPU init failed"));
            event_loop.exit();
            return;
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("Resized: {}x{}", size.width, size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if code == KeyCode::Escape && event.state == ElementState::Pressed {
                    event_loop.exit();
                    return;
                }
                self.handle_key(code, event.state);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

/// Open the viewer window and run until it is closed.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config)?;
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
