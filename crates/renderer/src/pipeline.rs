//! Shader loading and render pipeline creation.

use crate::{
    texture::Texture,
    vertex::{GridVertex, InstanceData, PieceInstance, Vertex},
};
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

const EMBEDDED_SHADERS: &[(&str, &str)] = &[
    ("terrain", include_str!("shaders/terrain.wgsl")),
    ("lit", include_str!("shaders/lit.wgsl")),
    ("batch", include_str!("shaders/batch.wgsl")),
];

/// Resolves WGSL sources from a shader directory, falling back to the copies built into the binary.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    /// Only the embedded sources.
    pub fn embedded_only() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn embedded(name: &str) -> Option<&'static str> {
        EMBEDDED_SHADERS
            .iter()
            .find(|(embedded, _)| *embedded == name)
            .map(|(_, source)| *source)
    }

    /// Source for `name`: `<dir>/<name>.wgsl` if readable, else the embedded copy.
    pub fn source(&self, name: &str) -> Option<Cow<'static, str>> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.wgsl"));
            match std::fs::read_to_string(&path) {
                Ok(source) => {
                    log::debug!("Loaded shader {}", path.display());
                    return Some(Cow::Owned(source));
                }
                Err(e) => log::warn!("Shader {} unavailable ({}), using built-in source", path.display(), e),
            }
        }
        Self::embedded(name).map(Cow::Borrowed)
    }

    /// Compile `name`. An on-disk override that fails validation falls back to the embedded source.
    pub fn load(&self, device: &wgpu::Device, name: &str) -> Option<wgpu::ShaderModule> {
        let source = self.source(name)?;
        if let Some(module) = compile_shader(device, name, &source) {
            return Some(module);
        }
        match (&source, Self::embedded(name)) {
            (Cow::Owned(_), Some(embedded)) => {
                log::warn!("Falling back to built-in {} shader", name);
                compile_shader(device, name, embedded)
            }
            _ => None,
        }
    }
}

/// Create a shader module inside a validation error scope. Errors are logged, never raised.
pub fn compile_shader(device: &wgpu::Device, label: &str, source: &str) -> Option<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            log::error!("Shader '{}' failed to compile:\n{}", label, err);
            None
        }
        None => Some(module),
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Batch uniform: view-projection and the 2-D light.
pub fn create_batch_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Batch Bind Group Layout"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, false)],
    })
}

/// Terrain uniform plus the R32Float heightmap array, read with `textureLoad` in the vertex stage.
pub fn create_terrain_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Terrain Bind Group Layout"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, false),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                    multisampled: false,
                },
                count: None,
            },
        ],
    })
}

/// Camera (binding 0) and lights (binding 1).
pub fn create_frame_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Frame Bind Group Layout"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, false),
            uniform_entry(1, wgpu::ShaderStages::FRAGMENT, false),
        ],
    })
}

/// Per-draw model uniform addressed with a dynamic offset.
pub fn create_model_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Model Bind Group Layout"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, true)],
    })
}

pub fn create_texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Texture Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

struct PipelineDesc<'a> {
    label: &'a str,
    layouts: &'a [&'a wgpu::BindGroupLayout],
    shader: &'a wgpu::ShaderModule,
    fragment_entry: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    format: wgpu::TextureFormat,
    polygon_mode: wgpu::PolygonMode,
    cull_mode: Option<wgpu::Face>,
}

fn create_pipeline(device: &wgpu::Device, desc: PipelineDesc) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(desc.label),
        bind_group_layouts: desc.layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: Some("vs_main"),
            buffers: desc.buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: Some(desc.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: desc.cull_mode,
            polygon_mode: desc.polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            // Pull wireframe lines towards the camera so they win against the filled seam.
            bias: if desc.polygon_mode == wgpu::PolygonMode::Line {
                wgpu::DepthBiasState {
                    constant: -1,
                    slope_scale: -1.0,
                    clamp: 0.0,
                }
            } else {
                wgpu::DepthBiasState::default()
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Clipmap terrain: grid vertices plus per-piece instances. No culling, the trim rotations flip winding.
pub fn create_terrain_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    terrain_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
    polygon_mode: wgpu::PolygonMode,
) -> wgpu::RenderPipeline {
    let label = if polygon_mode == wgpu::PolygonMode::Line {
        "Terrain Wireframe Pipeline"
    } else {
        "Terrain Pipeline"
    };
    create_pipeline(
        device,
        PipelineDesc {
            label,
            layouts: &[terrain_layout],
            shader,
            fragment_entry: "fs_main",
            buffers: &[GridVertex::layout(), PieceInstance::layout()],
            format,
            polygon_mode,
            cull_mode: None,
        },
    )
}

/// Forward-lit meshes. `fragment_entry` picks the material variant (`fs_flat` or `fs_textured`).
pub fn create_lit_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    layouts: &[&wgpu::BindGroupLayout],
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
) -> wgpu::RenderPipeline {
    create_pipeline(
        device,
        PipelineDesc {
            label: fragment_entry,
            layouts,
            shader,
            fragment_entry,
            buffers: &[Vertex::layout()],
            format,
            polygon_mode: wgpu::PolygonMode::Fill,
            cull_mode: Some(wgpu::Face::Back),
        },
    )
}

/// Instanced batches drawn through indirect buffers.
pub fn create_batch_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    batch_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    create_pipeline(
        device,
        PipelineDesc {
            label: "Batch Pipeline",
            layouts: &[batch_layout],
            shader,
            fragment_entry: "fs_main",
            buffers: &[Vertex::layout_with_color(), InstanceData::layout()],
            format,
            polygon_mode: wgpu::PolygonMode::Fill,
            cull_mode: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pipeline_has_an_embedded_shader() {
        for name in ["terrain", "lit", "batch"] {
            let source = ShaderLibrary::embedded(name).unwrap();
            assert!(source.contains("fn vs_main"), "{name} has no vertex entry point");
        }
        assert!(ShaderLibrary::embedded("missing").is_none());
    }

    #[test]
    fn missing_directory_falls_back_to_embedded() {
        let library = ShaderLibrary::new("/nonexistent/shader/dir");
        let source = library.source("terrain").unwrap();
        assert!(matches!(source, Cow::Borrowed(_)));
        assert_eq!(source, ShaderLibrary::embedded("terrain").unwrap());
        assert!(library.source("missing").is_none());

        let embedded = ShaderLibrary::embedded_only();
        assert!(embedded.dir().is_none());
        assert!(matches!(embedded.source("lit"), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn file_on_disk_overrides_embedded() {
        let dir = std::env::temp_dir().join(format!("shader_library_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("batch.wgsl"), "// override").unwrap();

        let library = ShaderLibrary::new(&dir);
        assert_eq!(library.source("batch").unwrap(), "// override");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn embedded_shaders_pass_naga_validation() {
        use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

        for name in ["terrain", "lit", "batch"] {
            let source = ShaderLibrary::embedded(name).unwrap();
            let module = wgpu::naga::front::wgsl::parse_str(source)
                .unwrap_or_else(|e| panic!("{name}.wgsl: {}", e.emit_to_string(source)));
            Validator::new(ValidationFlags::all(), Capabilities::all())
                .validate(&module)
                .unwrap_or_else(|e| panic!("{name}.wgsl failed validation: {e:?}"));
        }
    }

    #[test]
    fn lit_shader_exports_both_material_entry_points() {
        let source = ShaderLibrary::embedded("lit").unwrap();
        assert!(source.contains("fn fs_flat"));
        assert!(source.contains("fn fs_textured"));
    }
}
