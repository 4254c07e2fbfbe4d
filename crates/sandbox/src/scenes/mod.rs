//! Demo scenes. Each owns its renderer and draws into the shared main pass.

mod batches;
mod lighting;
mod terrain;

use anyhow::Result;
use glam::Vec3;
use input::InputState;
use renderer::{Camera, Renderer, ShaderLibrary};
use serde::{Deserialize, Serialize};

use crate::config::SandboxConfig;

pub use batches::BatchesScene;
pub use lighting::LightingScene;
pub use terrain::TerrainScene;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneKind {
    #[default]
    Terrain,
    Lighting,
    Batches,
}

impl SceneKind {
    pub const ALL: [SceneKind; 3] = [SceneKind::Terrain, SceneKind::Lighting, SceneKind::Batches];

    /// Scene bound to hotkey index `index` (key 1 is index 0).
    pub fn from_hotkey(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            SceneKind::Terrain => "Terrain",
            SceneKind::Lighting => "Lighting",
            SceneKind::Batches => "Batches",
        }
    }
}

/// Where the camera starts when a scene is entered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraStart {
    pub position: Vec3,
    /// Radians. Zero looks down -Z.
    pub yaw: f32,
    pub pitch: f32,
}

pub trait Scene {
    fn kind(&self) -> SceneKind;

    fn camera_start(&self) -> CameraStart;

    fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: 0.62,
            g: 0.72,
            b: 0.85,
            a: 1.0,
        }
    }

    /// Scene-specific keys.
    fn handle_input(&mut self, _input: &InputState, _renderer: &Renderer) {}

    fn update(&mut self, _dt: f32, _elapsed: f32) {}

    /// Toggle wireframe. Returns the new state, or `None` if the scene has no wireframe mode.
    fn toggle_wireframe(&mut self) -> Option<bool> {
        None
    }

    /// Upload per-frame data before the pass begins.
    fn prepare(&mut self, renderer: &Renderer, camera: &Camera);

    fn render(&self, pass: &mut wgpu::RenderPass<'_>);
}

pub fn build_scene(
    kind: SceneKind,
    renderer: &Renderer,
    shaders: &ShaderLibrary,
    config: &SandboxConfig,
) -> Result<Box<dyn Scene>> {
    log::info!("Loading {} scene", kind.title());
    let scene: Box<dyn Scene> = match kind {
        SceneKind::Terrain => Box::new(TerrainScene::new(renderer, shaders, &config.terrain)?),
        SceneKind::Lighting => Box::new(LightingScene::new(renderer, shaders, config.texture_path.as_deref())?),
        SceneKind::Batches => Box::new(BatchesScene::new(renderer, shaders)?),
    };
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotkeys_map_to_scenes_in_order() {
        assert_eq!(SceneKind::from_hotkey(0), Some(SceneKind::Terrain));
        assert_eq!(SceneKind::from_hotkey(1), Some(SceneKind::Lighting));
        assert_eq!(SceneKind::from_hotkey(2), Some(SceneKind::Batches));
        assert_eq!(SceneKind::from_hotkey(3), None);
    }
}
