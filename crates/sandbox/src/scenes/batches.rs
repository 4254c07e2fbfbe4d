//! Rectangles and triangles on a clip-space grid, one indirect draw per mesh.

use std::sync::Arc;

use anyhow::Result;
use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use input::InputState;
use renderer::{
    cursor_to_clip, BatchInstance, BatchRenderer, Camera, GraphicsBatch, MeshData, Renderer, ShaderLibrary,
};

use super::{CameraStart, Scene, SceneKind};

const GRID_SIDE: usize = 10;
const GRID_START: f32 = -0.95;
const GRID_STEP: f32 = 0.2;
const COLOR_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Quad,
    Triangle,
}

/// Grid cells in clip space. Even columns hold quads, odd columns triangles.
fn grid_layout() -> Vec<(Shape, Vec2)> {
    let mut cells = Vec::with_capacity(GRID_SIDE * GRID_SIDE);
    for column in 0..GRID_SIDE {
        let shape = if column % 2 == 0 { Shape::Quad } else { Shape::Triangle };
        for row in 0..GRID_SIDE {
            let position = Vec2::new(
                GRID_START + column as f32 * GRID_STEP,
                GRID_START + row as f32 * GRID_STEP,
            );
            cells.push((shape, position));
        }
    }
    cells
}

pub struct BatchesScene {
    batches: BatchRenderer,
}

impl BatchesScene {
    pub fn new(renderer: &Renderer, shaders: &ShaderLibrary) -> Result<Self> {
        let device = &renderer.device;
        let mut batches = BatchRenderer::new(device, renderer.format(), shaders)?;

        let mut quads = GraphicsBatch::new(device, Arc::new(MeshData::quad_2d().upload(device)));
        let mut triangles = GraphicsBatch::new(device, Arc::new(MeshData::triangle_2d().upload(device)));

        let mut rng = StdRng::seed_from_u64(COLOR_SEED);
        for (shape, position) in grid_layout() {
            let color = Vec4::new(rng.gen(), rng.gen(), rng.gen(), 1.0);
            let instance = BatchInstance::new(Mat4::from_translation(position.extend(0.0)), color);
            match shape {
                Shape::Quad => quads.push(instance),
                Shape::Triangle => triangles.push(instance),
            }
        }
        log::info!(
            "Batches: {} quads, {} triangles",
            quads.instances().len(),
            triangles.instances().len()
        );

        batches.add_batch(quads);
        batches.add_batch(triangles);
        Ok(Self { batches })
    }
}

impl Scene for BatchesScene {
    fn kind(&self) -> SceneKind {
        SceneKind::Batches
    }

    fn camera_start(&self) -> CameraStart {
        CameraStart {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: 0.1,
            g: 0.1,
            b: 0.12,
            a: 1.0,
        }
    }

    /// The light follows the cursor.
    fn handle_input(&mut self, input: &InputState, renderer: &Renderer) {
        if !input.is_cursor_locked() {
            self.batches
                .set_light_position(cursor_to_clip(input.cursor_position(), renderer.dimensions()));
        }
    }

    fn prepare(&mut self, renderer: &Renderer, _camera: &Camera) {
        // Vertices are already in clip space.
        self.batches.prepare(&renderer.device, &renderer.queue, Mat4::IDENTITY);
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.batches.render(pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_splits_evenly_between_shapes() {
        let cells = grid_layout();
        assert_eq!(cells.len(), 100);
        let quads = cells.iter().filter(|(s, _)| *s == Shape::Quad).count();
        assert_eq!(quads, 50);
        assert_eq!(cells.len() - quads, 50);
    }

    #[test]
    fn grid_spans_clip_space() {
        let cells = grid_layout();
        assert_eq!(cells[0], (Shape::Quad, Vec2::new(-0.95, -0.95)));
        assert_eq!(cells[GRID_SIDE].0, Shape::Triangle);
        assert!((cells[GRID_SIDE].1.x - -0.75).abs() < 1e-6);
        let last = cells[cells.len() - 1].1;
        assert!((last - Vec2::new(0.85, 0.85)).length() < 1e-5);
        // Shapes are 0.1 wide, so the last one still ends inside clip space.
        assert!(last.x + 0.1 <= 1.0);
    }
}
