//! Instanced batches drawn from indirect buffers.

use crate::{
    error::RendererError,
    mesh::Mesh,
    pipeline::{create_batch_bind_group_layout, create_batch_pipeline, ShaderLibrary},
    vertex::InstanceData,
};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};
use std::sync::Arc;
use wgpu::util::{DeviceExt, DrawIndexedIndirectArgs};

pub const INITIAL_BATCH_CAPACITY: usize = 64;

/// One instance of a batched mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchInstance {
    pub transform: Mat4,
    pub color: Vec4,
}

impl BatchInstance {
    pub fn new(transform: Mat4, color: Vec4) -> Self {
        Self { transform, color }
    }

    fn raw(&self) -> InstanceData {
        InstanceData::new(self.transform.to_cols_array_2d(), self.color.to_array())
    }
}

/// Per-frame batch uniform. Mirrors `Batch` in batch.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BatchUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Light position in clip space (xy), zw unused.
    pub light_pos: [f32; 4],
}

impl BatchUniform {
    pub fn new(view_proj: Mat4, light: Vec2) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            light_pos: [light.x, light.y, 0.0, 0.0],
        }
    }
}

/// Map a cursor position in window pixels (origin top-left) to clip space.
pub fn cursor_to_clip(cursor: Vec2, (width, height): (u32, u32)) -> Vec2 {
    let size = Vec2::new(width.max(1) as f32, height.max(1) as f32);
    let ndc = cursor / size * 2.0 - Vec2::ONE;
    Vec2::new(ndc.x, -ndc.y)
}

/// Capacity needed for `needed` instances, doubling from `current`.
pub fn grown_capacity(current: usize, needed: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < needed {
        capacity *= 2;
    }
    capacity
}

/// Draw command covering every instance of a mesh.
pub fn indirect_args(index_count: u32, instance_count: u32) -> DrawIndexedIndirectArgs {
    DrawIndexedIndirectArgs {
        index_count,
        instance_count,
        first_index: 0,
        base_vertex: 0,
        first_instance: 0,
    }
}

/// Every instance of one mesh, drawn with a single indirect call.
pub struct GraphicsBatch {
    mesh: Arc<Mesh>,
    instances: Vec<BatchInstance>,
    instance_buffer: wgpu::Buffer,
    indirect_buffer: wgpu::Buffer,
    capacity: usize,
}

impl GraphicsBatch {
    pub fn new(device: &wgpu::Device, mesh: Arc<Mesh>) -> Self {
        let indirect_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batch Indirect Buffer"),
            contents: indirect_args(mesh.num_indices, 0).as_bytes(),
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            instance_buffer: create_instance_buffer(device, INITIAL_BATCH_CAPACITY),
            indirect_buffer,
            capacity: INITIAL_BATCH_CAPACITY,
            mesh,
            instances: Vec::new(),
        }
    }

    pub fn push(&mut self, instance: BatchInstance) {
        self.instances.push(instance);
    }

    pub fn instances(&self) -> &[BatchInstance] {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut Vec<BatchInstance> {
        &mut self.instances
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rewrite the draw command and the instance data, growing the instance buffer if needed.
    pub fn update_buffers(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.instances.len() > self.capacity {
            let capacity = grown_capacity(self.capacity, self.instances.len());
            log::debug!("Growing batch instance buffer {} -> {}", self.capacity, capacity);
            self.instance_buffer = create_instance_buffer(device, capacity);
            self.capacity = capacity;
        }

        let args = indirect_args(self.mesh.num_indices, self.instances.len() as u32);
        queue.write_buffer(&self.indirect_buffer, 0, args.as_bytes());

        if !self.instances.is_empty() {
            let raw: Vec<InstanceData> = self.instances.iter().map(BatchInstance::raw).collect();
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        pass.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed_indirect(&self.indirect_buffer, 0);
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Batch Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceData>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Draws a set of batches with the instanced pipeline.
pub struct BatchRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    light_pos: Vec2,
    batches: Vec<GraphicsBatch>,
}

impl BatchRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, shaders: &ShaderLibrary) -> Result<Self, RendererError> {
        let layout = create_batch_bind_group_layout(device);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batch Uniform Buffer"),
            contents: bytemuck::cast_slice(&[BatchUniform::new(Mat4::IDENTITY, Vec2::ZERO)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Batch Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = shaders
            .load(device, "batch")
            .ok_or_else(|| RendererError::Shader("batch".into()))?;
        let pipeline = create_batch_pipeline(device, format, &layout, &shader);

        Ok(Self {
            pipeline,
            uniform_buffer,
            bind_group,
            light_pos: Vec2::ZERO,
            batches: Vec::new(),
        })
    }

    /// Add a batch and return its index.
    pub fn add_batch(&mut self, batch: GraphicsBatch) -> usize {
        self.batches.push(batch);
        self.batches.len() - 1
    }

    pub fn batches_mut(&mut self) -> &mut [GraphicsBatch] {
        &mut self.batches
    }

    /// Move the light, in clip space. Uploaded on the next [`Self::prepare`].
    pub fn set_light_position(&mut self, position: Vec2) {
        self.light_pos = position;
    }

    pub fn light_position(&self) -> Vec2 {
        self.light_pos
    }

    /// Upload the view-projection matrix, the light and every batch's buffers.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, view_proj: Mat4) {
        let uniform = BatchUniform::new(view_proj, self.light_pos);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        for batch in &mut self.batches {
            batch.update_buffers(device, queue);
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        for batch in self.batches.iter().filter(|b| !b.instances.is_empty()) {
            batch.draw(pass);
        }
    }
}
