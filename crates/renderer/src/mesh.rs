//! Mesh data structures and primitive generation.

use crate::vertex::Vertex;
use bytemuck::Pod;
use glam::Vec3;
use wgpu::util::DeviceExt;

/// A GPU mesh with vertex and index buffers.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl Mesh {
    /// Create a mesh from vertex and index data.
    pub fn new(device: &wgpu::Device, vertices: &[Vertex], indices: &[u32]) -> Self {
        Self::from_raw(device, "Mesh", vertices, indices)
    }

    /// Create a mesh from any plain-old-data vertex type.
    pub fn from_raw<V: Pod>(device: &wgpu::Device, label: &str, vertices: &[V], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
        }
    }

    /// Create a unit cube centered at origin.
    pub fn cube(device: &wgpu::Device) -> Self {
        MeshData::cube().upload(device)
    }

    /// Create a ground plane.
    pub fn plane(device: &wgpu::Device, size: f32) -> Self {
        MeshData::plane(size).upload(device)
    }

    /// Create a UV sphere.
    pub fn sphere(device: &wgpu::Device, radius: f32, segments: u32, rings: u32) -> Self {
        MeshData::sphere(radius, segments, rings).upload(device)
    }
}

/// Mesh data before GPU upload (for procedural generation).
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(&self, device: &wgpu::Device) -> Mesh {
        Mesh::new(device, &self.vertices, &self.indices)
    }

    pub fn cube() -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-0.5, -0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 0.0]),
            // Back face
            Vertex::new([0.5, -0.5, -0.5], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([-0.5, -0.5, -0.5], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, -0.5], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 0.0, -1.0], [0.0, 0.0]),
            // Top face
            Vertex::new([-0.5, 0.5, 0.5], [0.0, 1.0, 0.0], [0.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.5], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, -0.5], [0.0, 1.0, 0.0], [0.0, 0.0]),
            // Bottom face
            Vertex::new([-0.5, -0.5, -0.5], [0.0, -1.0, 0.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, -0.5], [0.0, -1.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.5], [0.0, -1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, -0.5, 0.5], [0.0, -1.0, 0.0], [0.0, 0.0]),
            // Right face
            Vertex::new([0.5, -0.5, 0.5], [1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.5], [1.0, 0.0, 0.0], [0.0, 0.0]),
            // Left face
            Vertex::new([-0.5, -0.5, -0.5], [-1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([-0.5, -0.5, 0.5], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, 0.5], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, -0.5], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        ];

        #[rustfmt::skip]
        let indices = vec![
            0, 1, 2, 2, 3, 0,       // Front
            4, 5, 6, 6, 7, 4,       // Back
            8, 9, 10, 10, 11, 8,    // Top
            12, 13, 14, 14, 15, 12, // Bottom
            16, 17, 18, 18, 19, 16, // Right
            20, 21, 22, 22, 23, 20, // Left
        ];

        Self { vertices, indices }
    }

    pub fn plane(size: f32) -> Self {
        let half = size / 2.0;
        let vertices = vec![
            Vertex::new([-half, 0.0, half], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([half, 0.0, half], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([half, 0.0, -half], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-half, 0.0, -half], [0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        Self { vertices, indices: vec![0, 1, 2, 2, 3, 0] }
    }

    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = radius * phi.cos();
            let ring_radius = radius * phi.sin();

            for segment in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                let normal = Vec3::new(x, y, z).normalize_or_zero();
                let uv = [segment as f32 / segments as f32, ring as f32 / rings as f32];

                vertices.push(Vertex::new([x, y, z], normal.into(), uv));
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.extend_from_slice(&[current, next, current + 1]);
                indices.extend_from_slice(&[current + 1, next, next + 1]);
            }
        }

        Self { vertices, indices }
    }

    /// Small clip-space quad split into four triangles around its centre (0.1 wide).
    pub fn quad_2d() -> Self {
        let vertices = vec![
            Vertex::flat(0.00, 0.00, [1.0, 0.0, 0.0]), // Bottom left
            Vertex::flat(0.10, 0.00, [0.0, 1.0, 0.0]), // Bottom right
            Vertex::flat(0.05, 0.05, [0.0, 0.0, 1.0]), // Center
            Vertex::flat(0.00, 0.10, [1.0, 1.0, 0.0]), // Top left
            Vertex::flat(0.10, 0.10, [1.0, 1.0, 1.0]), // Top right
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 1, 2, // Bottom
            1, 4, 2, // Right
            2, 4, 3, // Top
            0, 2, 3, // Left
        ];
        Self { vertices, indices }
    }

    /// Small clip-space triangle (0.1 wide).
    pub fn triangle_2d() -> Self {
        let vertices = vec![
            Vertex::flat(0.00, 0.0, [1.0, 0.0, 0.0]),
            Vertex::flat(0.05, 0.1, [0.0, 1.0, 0.0]),
            Vertex::flat(0.10, 0.0, [0.0, 0.0, 1.0]),
        ];
        Self { vertices, indices: vec![0, 1, 2] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_in_range(data: &MeshData) -> bool {
        data.indices.iter().all(|&i| (i as usize) < data.vertices.len())
    }

    #[test]
    fn primitives_have_valid_indices() {
        for data in [
            MeshData::cube(),
            MeshData::plane(4.0),
            MeshData::sphere(1.0, 12, 8),
            MeshData::quad_2d(),
            MeshData::triangle_2d(),
        ] {
            assert_eq!(data.indices.len() % 3, 0);
            assert!(indices_in_range(&data));
        }
    }

    #[test]
    fn quad_2d_is_four_triangles() {
        let quad = MeshData::quad_2d();
        assert_eq!(quad.vertices.len(), 5);
        assert_eq!(quad.indices.len(), 12);
    }
}
