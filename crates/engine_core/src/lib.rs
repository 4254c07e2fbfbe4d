//! Core engine types shared by the renderer, procgen, and sandbox crates:
//! - Transform and spatial helpers
//! - Frame timing and the title-bar FPS profiler

pub mod time;
pub mod transform;

pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{IVec2, Mat4, Quat, Vec2, Vec3, Vec4};
