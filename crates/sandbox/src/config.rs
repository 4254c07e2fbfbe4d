//! Sandbox configuration (window, camera, terrain). Loaded from sandbox.ron at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scenes::SceneKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("terrain.levels must be between 1 and {max}, got {got}")]
    Levels { got: u32, max: u32 },
    #[error("terrain.tile_resolution must be at least 1")]
    ZeroTileResolution,
    #[error("terrain.tile_resolution must be at most {max}, got {got}")]
    TileResolution { got: u32, max: u32 },
    #[error("terrain.chunks_per_side must be at least 1")]
    EmptyGrid,
    #[error("terrain.chunk_resolution must be at least 1")]
    ZeroChunkResolution,
    #[error("terrain.quad_size must be positive, got {0}")]
    QuadSize(f32),
    #[error("{layers} terrain chunks exceed the device limit of {max} texture array layers")]
    TooManyLayers { layers: u32, max: u32 },
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Deepest supported clipmap (level scale is a power of two up to 2^15).
pub const MAX_LEVELS: u32 = 16;

/// Largest clipmap tile side. Keeps the mesh index counts well inside `u32`.
pub const MAX_TILE_RESOLUTION: u32 = 512;

/// Terrain section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Clipmap LOD levels.
    #[serde(default = "default_levels")]
    pub levels: u32,
    /// Quads per clipmap tile side.
    #[serde(default = "default_tile_resolution")]
    pub tile_resolution: u32,
    /// Chunks per ring side (the ring holds N x N chunks).
    #[serde(default = "default_chunks_per_side")]
    pub chunks_per_side: u32,
    /// Heightmap samples per chunk side.
    #[serde(default = "default_chunk_resolution")]
    pub chunk_resolution: u32,
    /// World size of one finest-level quad.
    #[serde(default = "default_quad_size")]
    pub quad_size: f32,
    #[serde(default = "default_height_scale")]
    pub height_scale: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub wireframe: bool,
    /// Tint each clipmap piece by its mesh kind.
    #[serde(default)]
    pub debug_colors: bool,
}

fn default_levels() -> u32 {
    5
}
fn default_tile_resolution() -> u32 {
    16
}
fn default_chunks_per_side() -> u32 {
    8
}
fn default_chunk_resolution() -> u32 {
    128
}
fn default_quad_size() -> f32 {
    1.0
}
fn default_height_scale() -> f32 {
    120.0
}
fn default_seed() -> u64 {
    1337
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            tile_resolution: default_tile_resolution(),
            chunks_per_side: default_chunks_per_side(),
            chunk_resolution: default_chunk_resolution(),
            quad_size: default_quad_size(),
            height_scale: default_height_scale(),
            seed: default_seed(),
            wireframe: false,
            debug_colors: false,
        }
    }
}

impl TerrainConfig {
    /// Check the settings against each other and the device's texture array limit.
    pub fn validate(&self, max_texture_array_layers: u32) -> Result<(), ConfigError> {
        if self.levels == 0 || self.levels > MAX_LEVELS {
            return Err(ConfigError::Levels {
                got: self.levels,
                max: MAX_LEVELS,
            });
        }
        if self.tile_resolution == 0 {
            return Err(ConfigError::ZeroTileResolution);
        }
        if self.tile_resolution > MAX_TILE_RESOLUTION {
            return Err(ConfigError::TileResolution {
                got: self.tile_resolution,
                max: MAX_TILE_RESOLUTION,
            });
        }
        if self.chunks_per_side == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        if self.chunk_resolution == 0 {
            return Err(ConfigError::ZeroChunkResolution);
        }
        if self.quad_size.is_nan() || self.quad_size <= 0.0 {
            return Err(ConfigError::QuadSize(self.quad_size));
        }
        let layers = self.chunks_per_side.saturating_mul(self.chunks_per_side);
        if layers > max_texture_array_layers {
            return Err(ConfigError::TooManyLayers {
                layers,
                max: max_texture_array_layers,
            });
        }
        Ok(())
    }
}

/// Persistent sandbox settings. Loaded from `sandbox.ron` in the current directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Window width in logical pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Window height in logical pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_true")]
    pub vsync: bool,
    #[serde(default)]
    pub start_scene: SceneKind,
    /// Directory searched for WGSL overrides before the built-in shaders.
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
    /// Fly speed in world units per second.
    #[serde(default = "default_camera_speed")]
    pub camera_speed: f32,
    /// Speed multiplier while Shift is held.
    #[serde(default = "default_boost")]
    pub boost_multiplier: f32,
    /// Radians per pixel of mouse motion.
    #[serde(default = "default_sensitivity")]
    pub mouse_sensitivity: f32,
    /// PNG or JPEG for the lighting scene's textured material. The checkerboard is used when
    /// unset or unreadable.
    #[serde(default)]
    pub texture_path: Option<PathBuf>,
    #[serde(default)]
    pub terrain: TerrainConfig,
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}
fn default_true() -> bool {
    true
}
fn default_shader_dir() -> PathBuf {
    PathBuf::from("shaders")
}
fn default_camera_speed() -> f32 {
    40.0
}
fn default_boost() -> f32 {
    4.0
}
fn default_sensitivity() -> f32 {
    0.002
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            vsync: default_true(),
            start_scene: SceneKind::default(),
            shader_dir: default_shader_dir(),
            camera_speed: default_camera_speed(),
            boost_multiplier: default_boost(),
            mouse_sensitivity: default_sensitivity(),
            texture_path: None,
            terrain: TerrainConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Load config from `sandbox.ron`. A missing file is created with the defaults, an invalid one
    /// is left alone and the defaults are used.
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path);
            return config;
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => match Self::from_ron(&data) {
                Ok(config) => return config,
                Err(e) => log::warn!("{} in {:?}, using defaults", e, path),
            },
            Err(_) => log::info!("No config at {:?}, using defaults", path),
        }
        Self::default()
    }

    pub fn from_ron(data: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(data)?)
    }

    /// Write the config as pretty RON. Logs on error.
    pub fn save_to(&self, path: &Path) {
        match ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            Ok(s) => {
                if let Err(e) = std::fs::write(path, s) {
                    log::warn!("Could not write config to {:?}: {}", path, e);
                }
            }
            Err(e) => log::warn!("Could not serialize config: {}", e),
        }
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("sandbox.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_struct_uses_defaults() {
        let config = SandboxConfig::from_ron("()").unwrap();
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn partial_terrain_section_keeps_other_defaults() {
        let config = SandboxConfig::from_ron(
            "(start_scene: Lighting, terrain: (levels: 3, seed: 9, debug_colors: true))",
        )
        .unwrap();
        assert_eq!(config.start_scene, SceneKind::Lighting);
        assert_eq!(config.terrain.levels, 3);
        assert_eq!(config.terrain.seed, 9);
        assert!(config.terrain.debug_colors);
        assert_eq!(config.terrain.chunk_resolution, default_chunk_resolution());
        assert_eq!(config.window_width, 1280);
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        assert!(matches!(SandboxConfig::from_ron("(levels: "), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SandboxConfig::load_from(Path::new("/nonexistent/sandbox.ron"));
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn round_trips_through_ron() {
        let mut config = SandboxConfig::default();
        config.terrain.chunks_per_side = 4;
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        assert_eq!(SandboxConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn saved_file_loads_back() {
        let path = std::env::temp_dir().join(format!("sandbox_config_{}.ron", std::process::id()));
        let mut config = SandboxConfig::default();
        config.camera_speed = 12.5;
        config.save_to(&path);
        assert_eq!(SandboxConfig::load_from(&path), config);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn default_terrain_is_valid() {
        assert!(TerrainConfig::default().validate(256).is_ok());
    }

    #[test]
    fn validation_rejects_bad_terrain() {
        let base = TerrainConfig::default();

        let levels = TerrainConfig { levels: 0, ..base.clone() };
        assert!(matches!(levels.validate(256), Err(ConfigError::Levels { got: 0, .. })));

        let tiles = TerrainConfig {
            tile_resolution: 0,
            ..base.clone()
        };
        assert!(matches!(tiles.validate(256), Err(ConfigError::ZeroTileResolution)));

        let grid = TerrainConfig {
            chunks_per_side: 0,
            ..base.clone()
        };
        assert!(matches!(grid.validate(256), Err(ConfigError::EmptyGrid)));

        let quad = TerrainConfig {
            quad_size: 0.0,
            ..base.clone()
        };
        assert!(matches!(quad.validate(256), Err(ConfigError::QuadSize(_))));
    }

    #[test]
    fn tile_resolution_is_capped() {
        let at_cap = TerrainConfig {
            tile_resolution: MAX_TILE_RESOLUTION,
            ..Default::default()
        };
        assert!(at_cap.validate(256).is_ok());

        let huge = TerrainConfig {
            tile_resolution: u32::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            huge.validate(256),
            Err(ConfigError::TileResolution { got, max: MAX_TILE_RESOLUTION }) if got == u32::MAX / 2
        ));
    }

    #[test]
    fn texture_path_is_optional() {
        assert_eq!(SandboxConfig::default().texture_path, None);
        let config = SandboxConfig::from_ron(r#"(texture_path: Some("assets/bricks.png"))"#).unwrap();
        assert_eq!(config.texture_path, Some(PathBuf::from("assets/bricks.png")));
    }

    #[test]
    fn ring_must_fit_in_texture_array() {
        let terrain = TerrainConfig {
            chunks_per_side: 17,
            ..Default::default()
        };
        assert!(matches!(
            terrain.validate(256),
            Err(ConfigError::TooManyLayers { layers: 289, max: 256 })
        ));
        assert!(terrain.validate(2048).is_ok());
    }
}
