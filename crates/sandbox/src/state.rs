//! Sandbox state: renderer, camera, input and the active scene.

use std::sync::Arc;

use anyhow::Result;
use engine_core::{FrameProfiler, Time};
use input::{InputState, KeyCode, PhysicalKey};
use renderer::{Camera, Renderer, ShaderLibrary};
use winit::event::{DeviceEvent, WindowEvent};
use winit::window::{CursorGrabMode, Window};

use crate::config::SandboxConfig;
use crate::scenes::{build_scene, Scene, SceneKind};

pub const WINDOW_TITLE: &str = "Clipmap Sandbox";

pub struct SandboxState {
    renderer: Renderer,
    input: InputState,
    camera: Camera,
    time: Time,
    profiler: FrameProfiler,
    config: SandboxConfig,
    shaders: ShaderLibrary,
    scene: Box<dyn Scene>,
    pub running: bool,
}

impl SandboxState {
    pub async fn new(window: Arc<Window>, config: SandboxConfig) -> Result<Self> {
        let renderer = Renderer::new(window, config.vsync).await?;
        let shaders = if config.shader_dir.is_dir() {
            log::info!("Shader overrides from {:?}", config.shader_dir);
            ShaderLibrary::new(config.shader_dir.clone())
        } else {
            ShaderLibrary::embedded_only()
        };

        let scene = build_scene(config.start_scene, &renderer, &shaders, &config)?;
        let mut camera = Camera::new(glam::Vec3::ZERO);
        camera.sensitivity = config.mouse_sensitivity;
        let (width, height) = renderer.dimensions();
        camera.set_aspect(width, height);
        place_camera(&mut camera, scene.as_ref());

        let profiler = FrameProfiler::new(format!("{} - {}", WINDOW_TITLE, scene.kind().title()));
        renderer.window.set_title(&format!("{} - {}", WINDOW_TITLE, scene.kind().title()));

        Ok(Self {
            renderer,
            input: InputState::new(),
            camera,
            time: Time::new(),
            profiler,
            config,
            shaders,
            scene,
            running: true,
        })
    }

    /// Handle a window event. Returns true if the app should exit.
    pub fn handle_window_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                self.running = false;
                true
            }
            WindowEvent::Resized(size) => {
                self.renderer.resize(size);
                self.camera.set_aspect(size.width, size.height);
                false
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.input.process_keyboard(key, event.state);
                }
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.process_cursor_position((position.x, position.y));
                false
            }
            WindowEvent::MouseInput { state, .. } => {
                if state.is_pressed() && !self.input.is_cursor_locked() {
                    self.grab_cursor();
                }
                false
            }
            WindowEvent::Focused(false) => {
                self.release_cursor();
                false
            }
            WindowEvent::RedrawRequested => {
                self.update();
                if let Err(e) = self.render() {
                    log::error!("Render error: {}", e);
                }
                self.renderer.window.request_redraw();
                false
            }
            _ => false,
        }
    }

    /// Handle device events (raw mouse motion).
    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.process_mouse_motion(delta);
        }
    }

    fn grab_cursor(&mut self) {
        let window = &self.renderer.window;
        let _ = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        window.set_cursor_visible(false);
        self.input.set_cursor_locked(true);
    }

    fn release_cursor(&mut self) {
        let _ = self.renderer.window.set_cursor_grab(CursorGrabMode::None);
        self.renderer.window.set_cursor_visible(true);
        self.input.set_cursor_locked(false);
    }

    fn switch_scene(&mut self, kind: SceneKind) {
        if kind == self.scene.kind() {
            return;
        }
        match build_scene(kind, &self.renderer, &self.shaders, &self.config) {
            Ok(scene) => {
                self.scene = scene;
                place_camera(&mut self.camera, self.scene.as_ref());
                self.profiler
                    .set_base_title(format!("{} - {}", WINDOW_TITLE, kind.title()));
            }
            Err(e) => log::error!("Could not load {} scene: {:#}", kind.title(), e),
        }
    }

    fn update(&mut self) {
        self.time.update();
        let dt = self.time.delta_seconds();
        let elapsed = self.time.elapsed_seconds();

        if let Some(title) = self.profiler.tick(elapsed as f64) {
            self.renderer.window.set_title(&title);
        }

        if self.input.is_release_pressed() {
            self.release_cursor();
        }
        if let Some(kind) = self.input.scene_hotkey().and_then(SceneKind::from_hotkey) {
            self.switch_scene(kind);
        }
        if self.input.is_wireframe_toggled() {
            match self.scene.toggle_wireframe() {
                Some(enabled) => log::info!("Wireframe {}", if enabled { "on" } else { "off" }),
                None => log::info!("{} scene has no wireframe mode", self.scene.kind().title()),
            }
        }
        if self.input.is_key_pressed(KeyCode::KeyP) {
            let p = self.camera.position();
            log::info!("Camera at ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z);
        }
        self.scene.handle_input(&self.input, &self.renderer);

        if self.input.is_cursor_locked() {
            let delta = self.input.mouse_delta();
            self.camera.process_mouse(delta.x, delta.y);
        }
        let speed = if self.input.is_boosting() {
            self.config.camera_speed * self.config.boost_multiplier
        } else {
            self.config.camera_speed
        };
        self.camera.process_fly(self.input.fly_input(), speed, dt);

        self.scene.update(dt, elapsed);
        self.input.begin_frame();
    }

    fn render(&mut self) -> Result<()> {
        self.scene.prepare(&self.renderer, &self.camera);

        let Some(mut frame) = self.renderer.begin_frame()? else {
            return Ok(());
        };
        {
            let mut pass = self
                .renderer
                .begin_pass(&mut frame.encoder, &frame.view, self.scene.clear_color());
            self.scene.render(&mut pass);
        }
        self.renderer.end_frame(frame);
        Ok(())
    }
}

fn place_camera(camera: &mut Camera, scene: &dyn Scene) {
    let start = scene.camera_start();
    camera.set_position(start.position);
    camera.set_yaw_pitch(start.yaw, start.pitch);
}
