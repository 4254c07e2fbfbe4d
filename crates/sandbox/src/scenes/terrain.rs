//! Streaming clipmap terrain over procedural noise.

use anyhow::Result;
use glam::Vec3;
use input::{InputState, KeyCode};
use procgen::{HeightmapConfig, NoiseChunkGenerator};
use renderer::{Camera, Renderer, ShaderLibrary, TerrainRenderer, TerrainSettings};

use super::{CameraStart, Scene, SceneKind};
use crate::config::TerrainConfig;

pub struct TerrainScene {
    terrain: TerrainRenderer,
    config: TerrainConfig,
}

impl TerrainScene {
    pub fn new(renderer: &Renderer, shaders: &ShaderLibrary, config: &TerrainConfig) -> Result<Self> {
        config.validate(renderer.max_texture_array_layers())?;

        let settings = TerrainSettings {
            levels: config.levels,
            tile_resolution: config.tile_resolution,
            quad_size: config.quad_size,
            debug_colors: config.debug_colors,
            wireframe: false,
            ..Default::default()
        };
        let mut terrain = TerrainRenderer::new(
            &renderer.device,
            &renderer.queue,
            renderer.format(),
            shaders,
            Box::new(generator(config)?),
            settings,
            renderer.max_texture_array_layers(),
            renderer.supports_wireframe(),
        )?;
        terrain.set_wireframe(config.wireframe);

        Ok(Self {
            terrain,
            config: config.clone(),
        })
    }

    /// Swap in a generator with the next seed.
    fn reseed(&mut self, renderer: &Renderer) {
        self.config.seed = self.config.seed.wrapping_add(1);
        let result = generator(&self.config)
            .map_err(anyhow::Error::from)
            .and_then(|source| Ok(self.terrain.set_chunk_source(&renderer.queue, Box::new(source))?));
        match result {
            Ok(()) => log::info!("Terrain reseeded to {}", self.config.seed),
            Err(e) => log::error!("Terrain reseed failed: {}", e),
        }
    }
}

fn generator(config: &TerrainConfig) -> Result<NoiseChunkGenerator, procgen::ChunkError> {
    NoiseChunkGenerator::new(
        config.chunks_per_side,
        config.chunk_resolution,
        HeightmapConfig {
            seed: config.seed,
            height_scale: config.height_scale,
            ..Default::default()
        },
    )
}

impl Scene for TerrainScene {
    fn kind(&self) -> SceneKind {
        SceneKind::Terrain
    }

    fn camera_start(&self) -> CameraStart {
        CameraStart {
            position: Vec3::new(0.0, self.config.height_scale + 20.0, 0.0),
            yaw: 0.0,
            pitch: -0.3,
        }
    }

    fn handle_input(&mut self, input: &InputState, renderer: &Renderer) {
        if input.is_key_pressed(KeyCode::KeyG) {
            self.reseed(renderer);
        }
        if input.is_key_pressed(KeyCode::KeyC) {
            let enabled = !self.terrain.settings().debug_colors;
            self.terrain.set_debug_colors(enabled);
            log::info!("Terrain debug colors {}", if enabled { "on" } else { "off" });
        }
    }

    fn toggle_wireframe(&mut self) -> Option<bool> {
        let enabled = !self.terrain.wireframe();
        self.terrain.set_wireframe(enabled);
        Some(self.terrain.wireframe())
    }

    fn prepare(&mut self, renderer: &Renderer, camera: &Camera) {
        self.terrain.prepare(&renderer.queue, camera);
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.terrain.render(pass);
    }
}
