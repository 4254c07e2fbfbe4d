//! Windowed sandbox: streaming clipmap terrain, forward lighting and indirect batches.

mod config;
mod scenes;
mod state;

use anyhow::Result;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::SandboxConfig;
use state::{SandboxState, WINDOW_TITLE};

#[derive(Default)]
struct App {
    state: Option<SandboxState>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let config = SandboxConfig::load();
        let window_attrs = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(config.window_width, config.window_height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(SandboxState::new(window.clone(), config)) {
            Ok(s) => {
                self.state = Some(s);
                window.request_redraw();
            }
            Err(e) => {
                log::error!("Failed to initialize sandbox: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.handle_window_event(event) || !state.running {
                event_loop.exit();
            }
        }
    }

    fn device_event(&mut self, _: &ActiveEventLoop, _: DeviceId, event: DeviceEvent) {
        if let Some(state) = &mut self.state {
            state.handle_device_event(event);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Clipmap Sandbox");
    println!("  WASD / Mouse    Fly / look (click to grab the cursor)");
    println!("  Space / Ctrl    Up / down, Shift to boost");
    println!("  1 / 2 / 3       Terrain / Lighting / Batches scene");
    println!("  F               Toggle wireframe");
    println!("  G / C           Reseed terrain / toggle LOD debug colors");
    println!("  P               Log camera position");
    println!("  Cursor          Moves the light in the batches scene");
    println!("  Escape          Release cursor");

    let event_loop = EventLoop::new()?;
    // Poll so redraws are not held back waiting for input events.
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    event_loop.run_app(&mut app)?;

    Ok(())
}
