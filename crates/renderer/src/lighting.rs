//! Forward renderer with a fixed-capacity light uniform buffer.

use crate::{
    camera::{Camera, CameraUniform},
    error::RendererError,
    mesh::Mesh,
    pipeline::{
        create_frame_bind_group_layout, create_lit_pipeline, create_model_bind_group_layout,
        create_texture_bind_group_layout, ShaderLibrary,
    },
    texture::Texture,
};
use bytemuck::{Pod, Zeroable};
use engine_core::Transform;
use glam::{Mat4, Vec3};
use std::sync::Arc;
use wgpu::util::DeviceExt;

pub const MAX_SPOT_LIGHTS: usize = 6;
pub const MAX_POINT_LIGHTS: usize = 6;
pub const MAX_DIRECTIONAL_LIGHTS: usize = 2;

/// Stride between per-draw model uniforms (dynamic offsets must be 256-aligned).
pub const MODEL_UNIFORM_STRIDE: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Direction the light travels in.
    pub direction: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            direction: Vec3::new(-0.3, -1.0, -0.2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub max_radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            position: Vec3::ZERO,
            max_radius: 10.0,
        }
    }
}

/// Cone light. The umbra angle bounds the lit cone, inside the penumbra angle light is at full strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub direction: Vec3,
    pub max_radius: f32,
    pub umbra_degrees: f32,
    pub penumbra_degrees: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            max_radius: 10.0,
            umbra_degrees: 30.0,
            penumbra_degrees: 20.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightRaw {
    pub color_intensity: [f32; 3],
    pub _pad0: f32,
    pub direction: [f32; 3],
    pub _pad1: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightRaw {
    pub color_intensity: [f32; 3],
    pub _pad0: f32,
    pub position: [f32; 3],
    pub max_radius: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SpotLightRaw {
    pub color_intensity: [f32; 3],
    pub max_radius: f32,
    pub position: [f32; 3],
    pub cos_penumbra: f32,
    pub direction: [f32; 3],
    pub cos_umbra: f32,
}

/// Light uniform (must match lit.wgsl Lights).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightsUniform {
    pub spot: [SpotLightRaw; MAX_SPOT_LIGHTS],
    pub point: [PointLightRaw; MAX_POINT_LIGHTS],
    pub directional: [DirectionalLightRaw; MAX_DIRECTIONAL_LIGHTS],
    pub ambient: [f32; 3],
    pub spot_count: i32,
    pub point_count: i32,
    pub directional_count: i32,
    pub _pad: [i32; 2],
}

/// Lights dropped from each list because it exceeded capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightOverflow {
    pub spot: usize,
    pub point: usize,
    pub directional: usize,
}

impl LightOverflow {
    pub fn any(&self) -> bool {
        self.spot + self.point + self.directional > 0
    }
}

impl LightsUniform {
    /// Pack scene lights. Colors are pre-multiplied by intensity, extra lights are dropped.
    pub fn pack(
        ambient: Vec3,
        directional: &[DirectionalLight],
        point: &[PointLight],
        spot: &[SpotLight],
    ) -> (Self, LightOverflow) {
        let mut uniform = Self::zeroed();
        uniform.ambient = ambient.to_array();

        for (raw, light) in uniform.directional.iter_mut().zip(directional) {
            *raw = DirectionalLightRaw {
                color_intensity: (light.color * light.intensity).to_array(),
                direction: light.direction.normalize_or_zero().to_array(),
                ..Default::default()
            };
        }
        for (raw, light) in uniform.point.iter_mut().zip(point) {
            *raw = PointLightRaw {
                color_intensity: (light.color * light.intensity).to_array(),
                position: light.position.to_array(),
                max_radius: light.max_radius,
                ..Default::default()
            };
        }
        for (raw, light) in uniform.spot.iter_mut().zip(spot) {
            *raw = SpotLightRaw {
                color_intensity: (light.color * light.intensity).to_array(),
                max_radius: light.max_radius,
                position: light.position.to_array(),
                cos_penumbra: light.penumbra_degrees.to_radians().cos(),
                direction: light.direction.normalize_or_zero().to_array(),
                cos_umbra: light.umbra_degrees.to_radians().cos(),
            };
        }

        uniform.directional_count = directional.len().min(MAX_DIRECTIONAL_LIGHTS) as i32;
        uniform.point_count = point.len().min(MAX_POINT_LIGHTS) as i32;
        uniform.spot_count = spot.len().min(MAX_SPOT_LIGHTS) as i32;

        let overflow = LightOverflow {
            spot: spot.len().saturating_sub(MAX_SPOT_LIGHTS),
            point: point.len().saturating_sub(MAX_POINT_LIGHTS),
            directional: directional.len().saturating_sub(MAX_DIRECTIONAL_LIGHTS),
        };
        (uniform, overflow)
    }
}

/// Per-draw uniform (must match lit.wgsl Model).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl ModelUniform {
    pub fn new(model: Mat4, color: Vec3) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal: model.inverse().transpose().to_cols_array_2d(),
            color: color.extend(1.0).to_array(),
        }
    }
}

#[derive(Clone)]
pub enum Material {
    DiffuseFlat { color: Vec3 },
    DiffuseTextured { texture: Arc<Texture> },
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Material::DiffuseFlat { color } => f.debug_struct("DiffuseFlat").field("color", color).finish(),
            Material::DiffuseTextured { .. } => f.write_str("DiffuseTextured"),
        }
    }
}

/// Index into the renderer's material list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(usize);

struct GpuMaterial {
    material: Material,
    bind_group: wgpu::BindGroup,
}

pub struct MeshInstance {
    pub mesh: Arc<Mesh>,
    pub material: MaterialId,
    pub transform: Transform,
}

/// Draws mesh instances with flat or textured diffuse materials under the scene lights.
pub struct ForwardRenderer {
    flat_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_capacity: usize,
    white: Arc<Texture>,
    materials: Vec<GpuMaterial>,
    instances: Vec<MeshInstance>,
    directional_lights: Vec<DirectionalLight>,
    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    ambient: Vec3,
    overflow_warned: LightOverflow,
}

impl ForwardRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        shaders: &ShaderLibrary,
    ) -> Result<Self, RendererError> {
        let frame_layout = create_frame_bind_group_layout(device);
        let model_layout = create_model_bind_group_layout(device);
        let texture_layout = create_texture_bind_group_layout(device);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Forward Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[LightsUniform::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Forward Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        let model_capacity = 64;
        let (model_buffer, model_bind_group) = create_model_storage(device, &model_layout, model_capacity);

        let shader = shaders
            .load(device, "lit")
            .ok_or_else(|| RendererError::Shader("lit".into()))?;
        let layouts = [&frame_layout, &model_layout, &texture_layout];
        let flat_pipeline = create_lit_pipeline(device, format, &layouts, &shader, "fs_flat");
        let textured_pipeline = create_lit_pipeline(device, format, &layouts, &shader, "fs_textured");

        Ok(Self {
            flat_pipeline,
            textured_pipeline,
            texture_layout,
            model_layout,
            camera_buffer,
            lights_buffer,
            frame_bind_group,
            model_buffer,
            model_bind_group,
            model_capacity,
            white: Arc::new(Texture::white_pixel(device, queue)),
            materials: Vec::new(),
            instances: Vec::new(),
            directional_lights: Vec::new(),
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            ambient: Vec3::splat(0.05),
            overflow_warned: LightOverflow::default(),
        })
    }

    pub fn create_directional_light(&mut self, light: DirectionalLight) -> &mut DirectionalLight {
        let index = self.directional_lights.len();
        self.directional_lights.push(light);
        &mut self.directional_lights[index]
    }

    pub fn create_point_light(&mut self, light: PointLight) -> &mut PointLight {
        let index = self.point_lights.len();
        self.point_lights.push(light);
        &mut self.point_lights[index]
    }

    pub fn create_spot_light(&mut self, light: SpotLight) -> &mut SpotLight {
        let index = self.spot_lights.len();
        self.spot_lights.push(light);
        &mut self.spot_lights[index]
    }

    pub fn create_material(&mut self, device: &wgpu::Device, material: Material) -> MaterialId {
        let texture = match &material {
            Material::DiffuseFlat { .. } => &self.white,
            Material::DiffuseTextured { texture } => texture,
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });
        self.materials.push(GpuMaterial { material, bind_group });
        MaterialId(self.materials.len() - 1)
    }

    pub fn create_mesh_instance(&mut self, mesh: Arc<Mesh>, material: MaterialId) -> &mut MeshInstance {
        let index = self.instances.len();
        self.instances.push(MeshInstance {
            mesh,
            material,
            transform: Transform::default(),
        });
        &mut self.instances[index]
    }

    pub fn set_ambient_light(&mut self, ambient: Vec3) {
        self.ambient = ambient;
    }

    pub fn instances_mut(&mut self) -> &mut [MeshInstance] {
        &mut self.instances
    }

    pub fn point_lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.point_lights
    }

    pub fn spot_lights_mut(&mut self) -> &mut [SpotLight] {
        &mut self.spot_lights
    }

    pub fn directional_lights_mut(&mut self) -> &mut [DirectionalLight] {
        &mut self.directional_lights
    }

    /// Upload camera, lights and per-instance model uniforms.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, camera: &Camera) {
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update(camera);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera_uniform]));

        let (lights, overflow) = LightsUniform::pack(
            self.ambient,
            &self.directional_lights,
            &self.point_lights,
            &self.spot_lights,
        );
        self.warn_overflow(overflow);
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::cast_slice(&[lights]));

        if self.instances.len() > self.model_capacity {
            self.model_capacity = self.instances.len().next_power_of_two();
            let (buffer, bind_group) = create_model_storage(device, &self.model_layout, self.model_capacity);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
        }

        let stride = MODEL_UNIFORM_STRIDE as usize;
        let mut bytes = vec![0u8; self.instances.len() * stride];
        for (i, instance) in self.instances.iter().enumerate() {
            let color = match self.materials.get(instance.material.0).map(|m| &m.material) {
                Some(Material::DiffuseFlat { color }) => *color,
                _ => Vec3::ONE,
            };
            let uniform = ModelUniform::new(instance.transform.to_matrix(), color);
            let raw = bytemuck::bytes_of(&uniform);
            bytes[i * stride..i * stride + raw.len()].copy_from_slice(raw);
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.model_buffer, 0, &bytes);
        }
    }

    fn warn_overflow(&mut self, overflow: LightOverflow) {
        let lists = [
            ("spot", overflow.spot, &mut self.overflow_warned.spot, MAX_SPOT_LIGHTS),
            ("point", overflow.point, &mut self.overflow_warned.point, MAX_POINT_LIGHTS),
            (
                "directional",
                overflow.directional,
                &mut self.overflow_warned.directional,
                MAX_DIRECTIONAL_LIGHTS,
            ),
        ];
        for (name, dropped, warned, max) in lists {
            if dropped > 0 && *warned == 0 {
                log::warn!("{} {} lights exceed the limit of {}, extra lights ignored", dropped, name, max);
            }
            *warned = dropped;
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for (i, instance) in self.instances.iter().enumerate() {
            let Some(material) = self.materials.get(instance.material.0) else {
                continue;
            };
            let pipeline = match material.material {
                Material::DiffuseFlat { .. } => &self.flat_pipeline,
                Material::DiffuseTextured { .. } => &self.textured_pipeline,
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, &self.model_bind_group, &[(i as u64 * MODEL_UNIFORM_STRIDE) as u32]);
            pass.set_bind_group(2, &material.bind_group, &[]);
            pass.set_vertex_buffer(0, instance.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(instance.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..instance.mesh.num_indices, 0, 0..1);
        }
    }
}

fn create_model_storage(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Model Uniform Buffer"),
        size: capacity as u64 * MODEL_UNIFORM_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Model Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn std140_layout_matches_shader() {
        assert_eq!(size_of::<DirectionalLightRaw>(), 32);
        assert_eq!(size_of::<PointLightRaw>(), 32);
        assert_eq!(size_of::<SpotLightRaw>(), 48);
        assert_eq!(offset_of!(LightsUniform, point), 288);
        assert_eq!(offset_of!(LightsUniform, directional), 480);
        assert_eq!(offset_of!(LightsUniform, ambient), 544);
        assert_eq!(offset_of!(LightsUniform, spot_count), 556);
        assert_eq!(size_of::<LightsUniform>(), 576);
        assert!(size_of::<ModelUniform>() as u64 <= MODEL_UNIFORM_STRIDE);
    }

    #[test]
    fn packing_premultiplies_intensity() {
        let point = PointLight {
            color: Vec3::new(1.0, 0.5, 0.0),
            intensity: 4.0,
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        let (uniform, overflow) = LightsUniform::pack(Vec3::splat(0.1), &[], &[point], &[]);
        assert!(!overflow.any());
        assert_eq!(uniform.point_count, 1);
        assert_eq!(uniform.point[0].color_intensity, [4.0, 2.0, 0.0]);
        assert_eq!(uniform.point[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(uniform.point[0].max_radius, 10.0);
        assert_eq!(uniform.ambient, [0.1, 0.1, 0.1]);
    }

    #[test]
    fn packing_clamps_to_capacity() {
        let points = vec![PointLight::default(); 9];
        let spots = vec![SpotLight::default(); 6];
        let suns = vec![DirectionalLight::default(); 3];
        let (uniform, overflow) = LightsUniform::pack(Vec3::ZERO, &suns, &points, &spots);
        assert_eq!(uniform.point_count, MAX_POINT_LIGHTS as i32);
        assert_eq!(uniform.spot_count, MAX_SPOT_LIGHTS as i32);
        assert_eq!(uniform.directional_count, MAX_DIRECTIONAL_LIGHTS as i32);
        assert_eq!(
            overflow,
            LightOverflow {
                spot: 0,
                point: 3,
                directional: 1,
            }
        );
    }

    #[test]
    fn spot_cone_cosines_are_ordered() {
        let (uniform, _) = LightsUniform::pack(Vec3::ZERO, &[], &[], &[SpotLight::default()]);
        let spot = uniform.spot[0];
        // Full strength inside the penumbra, zero outside the umbra.
        assert!(spot.cos_penumbra > spot.cos_umbra);
        assert!((spot.cos_umbra - 30f32.to_radians().cos()).abs() < 1e-6);
        assert_eq!(spot.direction, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn directions_are_normalised() {
        let sun = DirectionalLight {
            direction: Vec3::new(0.0, -10.0, 0.0),
            ..Default::default()
        };
        let (uniform, _) = LightsUniform::pack(Vec3::ZERO, &[sun], &[], &[]);
        assert_eq!(uniform.directional[0].direction, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn model_uniform_carries_normal_matrix() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniform = ModelUniform::new(model, Vec3::new(0.2, 0.4, 0.6));
        assert_eq!(uniform.normal[0][0], 0.5);
        assert_eq!(uniform.color, [0.2, 0.4, 0.6, 1.0]);
    }
}
