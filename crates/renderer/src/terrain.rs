//! Streaming geoclipmap terrain.
//!
//! [`TerrainStreamer`] keeps the chunk ring centred on the camera and re-uploads only the row or
//! column that a ring step reveals. [`ClipmapLayout`] plans where every clipmap piece goes for
//! the current camera position. [`TerrainRenderer`] ties both to the GPU: it owns the heightmap
//! array, the piece meshes and the pipelines, and draws each mesh kind with one instanced call.

use crate::{
    camera::Camera,
    clipmap::{self, ClipmapMeshes, MeshKind},
    error::RendererError,
    heightmap::{HeightmapArray, HeightmapUpload, LayerSink},
    pipeline::{create_terrain_bind_group_layout, create_terrain_pipeline, ShaderLibrary},
    vertex::PieceInstance,
};
use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Vec2, Vec3};
use procgen::{ChunkError, ChunkSource};
use wgpu::util::DeviceExt;

/// One ring step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingStep {
    Left,
    Right,
    Up,
    Down,
}

/// Steps taken during one streamer update, at most one per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamUpdate {
    pub x: Option<RingStep>,
    pub z: Option<RingStep>,
}

impl StreamUpdate {
    pub fn is_idle(&self) -> bool {
        self.x.is_none() && self.z.is_none()
    }
}

/// Moves the chunk ring with the camera.
pub struct TerrainStreamer {
    source: Box<dyn ChunkSource>,
    quad_size: f32,
    anchor: Option<Vec2>,
}

impl TerrainStreamer {
    pub fn new(source: Box<dyn ChunkSource>, quad_size: f32) -> Self {
        Self {
            source,
            quad_size,
            anchor: None,
        }
    }

    pub fn source(&self) -> &dyn ChunkSource {
        self.source.as_ref()
    }

    /// Swap the source. The new ring is scrolled onto the current data origin so it stays
    /// around the camera and the anchor carries over. Every slot is stale afterwards; follow
    /// with [`Self::fill_all`].
    pub fn set_source(&mut self, mut source: Box<dyn ChunkSource>) {
        scroll_to(source.as_mut(), self.source.data_origin());
        self.source = source;
    }

    /// World distance covered by one chunk.
    pub fn chunk_world_size(&self) -> f32 {
        self.source.chunk_resolution() as f32 * self.quad_size
    }

    pub fn anchor(&self) -> Option<Vec2> {
        self.anchor
    }

    /// Upload every slot of the ring.
    pub fn fill_all(&self, sink: &mut dyn LayerSink) -> Result<(), ChunkError> {
        for y in 0..self.source.chunks_per_side() {
            self.upload_row(y, sink)?;
        }
        Ok(())
    }

    /// Advance the ring towards the camera (XZ world position).
    pub fn update(&mut self, camera: Vec2, sink: &mut dyn LayerSink) -> Result<StreamUpdate, ChunkError> {
        let Some(mut anchor) = self.anchor else {
            self.anchor = Some(camera);
            return Ok(StreamUpdate::default());
        };

        let size = self.chunk_world_size();
        let movement = camera - anchor;
        let mut update = StreamUpdate::default();

        if movement.x > size {
            self.source.update_right();
            anchor.x += size;
            update.x = Some(RingStep::Right);
        } else if movement.x < -size {
            self.source.update_left();
            anchor.x -= size;
            update.x = Some(RingStep::Left);
        }

        if movement.y < -size {
            self.source.update_up();
            anchor.y -= size;
            update.z = Some(RingStep::Up);
        } else if movement.y > size {
            self.source.update_down();
            anchor.y += size;
            update.z = Some(RingStep::Down);
        }

        self.anchor = Some(anchor);

        match update.x {
            Some(RingStep::Right) => self.upload_column(self.source.right(), sink)?,
            Some(RingStep::Left) => self.upload_column(self.source.left(), sink)?,
            _ => {}
        }
        match update.z {
            Some(RingStep::Up) => self.upload_row(self.source.up(), sink)?,
            Some(RingStep::Down) => self.upload_row(self.source.down(), sink)?,
            _ => {}
        }

        for step in [update.x, update.z].into_iter().flatten() {
            log::info!(
                "Terrain ring stepped {:?}, data origin now {}",
                step,
                self.source.data_origin()
            );
        }

        Ok(update)
    }

    fn upload_column(&self, x: u32, sink: &mut dyn LayerSink) -> Result<(), ChunkError> {
        let n = self.source.chunks_per_side();
        for y in 0..n {
            sink.write_layer(y * n + x, &self.source.chunk_data(x, y)?);
        }
        Ok(())
    }

    fn upload_row(&self, y: u32, sink: &mut dyn LayerSink) -> Result<(), ChunkError> {
        let n = self.source.chunks_per_side();
        for x in 0..n {
            sink.write_layer(y * n + x, &self.source.chunk_data(x, y)?);
        }
        Ok(())
    }
}

/// Step `source` one chunk at a time until its data origin is `target`.
fn scroll_to(source: &mut dyn ChunkSource, target: IVec2) {
    let origin = source.data_origin();
    log::debug!("Scrolling chunk source from {} to {}", origin, target);
    for _ in origin.x..target.x {
        source.update_right();
    }
    for _ in target.x..origin.x {
        source.update_left();
    }
    for _ in origin.y..target.y {
        source.update_down();
    }
    for _ in target.y..origin.y {
        source.update_up();
    }
}

/// Rotation of the trim piece about +Y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrimRotation {
    #[default]
    Identity,
    Quarter,
    ThreeQuarters,
    Half,
}

impl TrimRotation {
    pub fn from_index(index: u32) -> Self {
        match index & 3 {
            0 => TrimRotation::Identity,
            1 => TrimRotation::Quarter,
            2 => TrimRotation::ThreeQuarters,
            _ => TrimRotation::Half,
        }
    }

    /// Pick the rotation that moves the trim into the gap a level leaves inside its parent.
    /// `d` is the camera offset from the parent's snapped position, `scale` the level scale.
    pub fn for_offset(d: Vec2, scale: f32) -> Self {
        let index = (((d.x < scale) as u32) << 1) | (d.y < scale) as u32;
        Self::from_index(index)
    }

    pub fn index(self) -> u32 {
        match self {
            TrimRotation::Identity => 0,
            TrimRotation::Quarter => 1,
            TrimRotation::ThreeQuarters => 2,
            TrimRotation::Half => 3,
        }
    }

    pub fn degrees(self) -> f32 {
        match self {
            TrimRotation::Identity => 0.0,
            TrimRotation::Quarter => 90.0,
            TrimRotation::ThreeQuarters => 270.0,
            TrimRotation::Half => 180.0,
        }
    }

    /// Column-major 2x2 matrix acting on (x, z).
    pub fn matrix(self) -> [f32; 4] {
        match self {
            TrimRotation::Identity => [1.0, 0.0, 0.0, 1.0],
            TrimRotation::Quarter => [0.0, -1.0, 1.0, 0.0],
            TrimRotation::ThreeQuarters => [0.0, 1.0, -1.0, 0.0],
            TrimRotation::Half => [-1.0, 0.0, 0.0, -1.0],
        }
    }

    pub fn apply(self, p: Vec2) -> Vec2 {
        let m = self.matrix();
        Vec2::new(m[0] * p.x + m[2] * p.y, m[1] * p.x + m[3] * p.y)
    }
}

/// One planned clipmap draw, in grid units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPiece {
    pub kind: MeshKind,
    pub level: u32,
    pub offset: Vec2,
    pub scale: f32,
    pub rotation: TrimRotation,
}

impl DrawPiece {
    fn new(kind: MeshKind, level: u32, offset: Vec2, scale: f32) -> Self {
        Self {
            kind,
            level,
            offset,
            scale,
            rotation: TrimRotation::Identity,
        }
    }

    pub fn instance(&self) -> PieceInstance {
        let [r, g, b] = self.kind.debug_color();
        PieceInstance {
            offset: self.offset.to_array(),
            scale: self.scale,
            level: self.level,
            rotation: self.rotation.matrix(),
            color: [r, g, b, 1.0],
        }
    }
}

/// Where the clipmap pieces go for a camera position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipmapLayout {
    pub levels: u32,
    pub tile_resolution: u32,
}

impl ClipmapLayout {
    pub fn new(levels: u32, tile_resolution: u32) -> Self {
        Self {
            levels: levels.max(1),
            tile_resolution: tile_resolution.max(1),
        }
    }

    /// Upper bound on pieces per frame.
    pub fn max_pieces(&self) -> usize {
        1 + self.levels as usize * 19
    }

    pub fn plan(&self, camera: Vec2) -> Vec<DrawPiece> {
        let mut pieces = Vec::with_capacity(self.max_pieces());
        self.plan_into(camera, &mut pieces);
        pieces
    }

    /// Plan into `out`, reusing its allocation. `camera` is in grid units.
    pub fn plan_into(&self, camera: Vec2, out: &mut Vec<DrawPiece>) {
        out.clear();
        let r = self.tile_resolution as f32;

        out.push(DrawPiece::new(MeshKind::Cross, 0, camera.floor(), 1.0));

        for level in 0..self.levels {
            let scale = (1u32 << level) as f32;
            let snapped = (camera / scale).floor() * scale;

            let tile_size = r * scale;
            let level_origin = snapped - Vec2::splat(r * 2.0 * scale);

            for y in 0..4 {
                for x in 0..4 {
                    // Coarser levels leave the centre to the finer level.
                    if level != 0 && (x == 1 || x == 2) && (y == 1 || y == 2) {
                        continue;
                    }
                    let fill = Vec2::new((x >= 2) as u32 as f32, (y >= 2) as u32 as f32) * scale;
                    let offset = level_origin + Vec2::new(x as f32, y as f32) * tile_size + fill;
                    out.push(DrawPiece::new(MeshKind::Tile, level, offset, scale));
                }
            }

            out.push(DrawPiece::new(MeshKind::Filler, level, snapped, scale));

            if level + 1 == self.levels {
                continue;
            }

            let next_scale = scale * 2.0;
            let next_snapped = (camera / next_scale).floor() * next_scale;

            let mut trim = DrawPiece::new(MeshKind::Trim, level, snapped + Vec2::splat(scale * 0.5), scale);
            trim.rotation = TrimRotation::for_offset(camera - next_snapped, scale);
            out.push(trim);

            let seam_offset = next_snapped - Vec2::splat(r * 2.0 * scale);
            out.push(DrawPiece::new(MeshKind::Seam, level, seam_offset, scale));
        }
    }
}

/// Terrain shader uniform (must match terrain.wgsl TerrainUniform).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TerrainUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub sun_direction: [f32; 4],
    /// World chunk held by slot (left, up).
    pub data_origin: [i32; 2],
    /// Slot (left, up).
    pub ring_origin: [i32; 2],
    pub chunk_resolution: u32,
    pub chunks_per_side: u32,
    pub quad_size: f32,
    pub debug_colors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSettings {
    pub levels: u32,
    pub tile_resolution: u32,
    /// World size of one finest-level quad (and one heightmap texel).
    pub quad_size: f32,
    pub debug_colors: bool,
    pub wireframe: bool,
    pub sun_direction: Vec3,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            levels: 6,
            tile_resolution: 32,
            quad_size: 1.0,
            debug_colors: false,
            wireframe: false,
            sun_direction: Vec3::new(0.4, 1.0, 0.3),
        }
    }
}

/// GPU side of the streaming clipmap.
pub struct TerrainRenderer {
    settings: TerrainSettings,
    layout: ClipmapLayout,
    streamer: TerrainStreamer,
    meshes: ClipmapMeshes,
    heightmap: HeightmapArray,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
    wireframe_pipeline: Option<wgpu::RenderPipeline>,
    instance_buffer: wgpu::Buffer,
    pieces: Vec<DrawPiece>,
    instances: Vec<PieceInstance>,
    /// Instance range per mesh kind, as (first, count).
    ranges: [(u32, u32); 5],
}

impl TerrainRenderer {
    /// `max_layers` is the device's texture array limit. The wireframe pipeline is only built
    /// when `line_mode_supported`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        shaders: &ShaderLibrary,
        source: Box<dyn ChunkSource>,
        settings: TerrainSettings,
        max_layers: u32,
        line_mode_supported: bool,
    ) -> Result<Self, RendererError> {
        let layout = ClipmapLayout::new(settings.levels, settings.tile_resolution);
        let mesh_set = clipmap::generate(layout.tile_resolution);
        let meshes = ClipmapMeshes::upload(device, &mesh_set);

        let heightmap = HeightmapArray::new(
            device,
            source.chunk_resolution(),
            source.chunks_amount(),
            max_layers,
        )?;

        let streamer = TerrainStreamer::new(source, settings.quad_size);
        streamer.fill_all(&mut HeightmapUpload { array: &heightmap, queue })?;

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Uniform Buffer"),
            contents: bytemuck::cast_slice(&[TerrainUniform::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = create_terrain_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Terrain Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(heightmap.view()),
                },
            ],
        });

        let shader = shaders
            .load(device, "terrain")
            .ok_or_else(|| RendererError::Shader("terrain".into()))?;
        let pipeline = create_terrain_pipeline(device, format, &bind_group_layout, &shader, wgpu::PolygonMode::Fill);
        let wireframe_pipeline = if line_mode_supported {
            Some(create_terrain_pipeline(
                device,
                format,
                &bind_group_layout,
                &shader,
                wgpu::PolygonMode::Line,
            ))
        } else {
            log::warn!("Adapter lacks POLYGON_MODE_LINE, terrain wireframe disabled");
            None
        };

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Piece Instances"),
            size: (layout.max_pieces() * std::mem::size_of::<PieceInstance>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!(
            "Terrain: {} levels, tile resolution {}, {} chunks of {} samples",
            layout.levels,
            layout.tile_resolution,
            streamer.source().chunks_amount(),
            streamer.source().chunk_resolution()
        );

        Ok(Self {
            settings,
            layout,
            streamer,
            meshes,
            heightmap,
            uniform_buffer,
            bind_group,
            pipeline,
            wireframe_pipeline,
            instance_buffer,
            pieces: Vec::with_capacity(layout.max_pieces()),
            instances: Vec::with_capacity(layout.max_pieces()),
            ranges: [(0, 0); 5],
        })
    }

    /// Replace the chunk source. It must match the heightmap array's shape.
    pub fn set_chunk_source(&mut self, queue: &wgpu::Queue, source: Box<dyn ChunkSource>) -> Result<(), RendererError> {
        let want_res = self.heightmap.resolution();
        let want_side = self.streamer.source().chunks_per_side();
        if source.chunk_resolution() != want_res || source.chunks_per_side() != want_side {
            return Err(RendererError::SourceMismatch {
                got_side: source.chunks_per_side(),
                got_res: source.chunk_resolution(),
                want_side,
                want_res,
            });
        }
        self.streamer.set_source(source);
        self.streamer.fill_all(&mut HeightmapUpload {
            array: &self.heightmap,
            queue,
        })?;
        Ok(())
    }

    pub fn streamer(&self) -> &TerrainStreamer {
        &self.streamer
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn set_wireframe(&mut self, enabled: bool) {
        self.settings.wireframe = enabled && self.wireframe_pipeline.is_some();
    }

    pub fn wireframe(&self) -> bool {
        self.settings.wireframe
    }

    pub fn set_debug_colors(&mut self, enabled: bool) {
        self.settings.debug_colors = enabled;
    }

    /// Stream chunks, plan pieces and upload per-frame data. Call before [`Self::render`].
    pub fn prepare(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        let position = camera.position();
        let camera_xz = Vec2::new(position.x, position.z);

        let mut sink = HeightmapUpload {
            array: &self.heightmap,
            queue,
        };
        if let Err(e) = self.streamer.update(camera_xz, &mut sink) {
            log::error!("Terrain streaming failed: {}", e);
        }

        self.layout
            .plan_into(camera_xz / self.settings.quad_size, &mut self.pieces);

        self.instances.clear();
        for kind in MeshKind::ALL {
            let first = self.instances.len() as u32;
            self.instances
                .extend(self.pieces.iter().filter(|p| p.kind == kind).map(DrawPiece::instance));
            self.ranges[kind.index()] = (first, self.instances.len() as u32 - first);
        }
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&self.instances));

        let source = self.streamer.source();
        let uniform = TerrainUniform {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_pos: [position.x, position.y, position.z, 1.0],
            sun_direction: self.settings.sun_direction.normalize_or_zero().extend(0.0).to_array(),
            data_origin: source.data_origin().to_array(),
            ring_origin: [source.left() as i32, source.up() as i32],
            chunk_resolution: source.chunk_resolution(),
            chunks_per_side: source.chunks_per_side(),
            quad_size: self.settings.quad_size,
            debug_colors: self.settings.debug_colors as u32,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// One instanced draw per mesh kind. The seam always stays filled.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

        for kind in MeshKind::ALL {
            let (first, count) = self.ranges[kind.index()];
            if count == 0 {
                continue;
            }
            let pipeline = match (&self.wireframe_pipeline, self.settings.wireframe) {
                (Some(wireframe), true) if kind != MeshKind::Seam => wireframe,
                _ => &self.pipeline,
            };
            let mesh = self.meshes.get(kind);
            pass.set_pipeline(pipeline);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.num_indices, 0, first..first + count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipmap::clipmap_vert_resolution;
    use procgen::{HeightmapConfig, NoiseChunkGenerator};
    use std::collections::HashSet;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<(u32, Vec<f32>)>,
    }

    impl LayerSink for RecordingSink {
        fn write_layer(&mut self, layer: u32, samples: &[f32]) {
            self.writes.push((layer, samples.to_vec()));
        }
    }

    impl RecordingSink {
        fn layers(&self) -> HashSet<u32> {
            self.writes.iter().map(|(layer, _)| *layer).collect()
        }
    }

    const PER_SIDE: u32 = 3;
    const RES: u32 = 4;

    fn streamer() -> TerrainStreamer {
        let source = NoiseChunkGenerator::new(PER_SIDE, RES, HeightmapConfig::default()).unwrap();
        TerrainStreamer::new(Box::new(source), 1.0)
    }

    fn column_layers(x: u32) -> HashSet<u32> {
        (0..PER_SIDE).map(|y| y * PER_SIDE + x).collect()
    }

    fn row_layers(y: u32) -> HashSet<u32> {
        (0..PER_SIDE).map(|x| y * PER_SIDE + x).collect()
    }

    #[test]
    fn fill_all_uploads_every_layer_once() {
        let streamer = streamer();
        let mut sink = RecordingSink::default();
        streamer.fill_all(&mut sink).unwrap();
        assert_eq!(sink.writes.len(), (PER_SIDE * PER_SIDE) as usize);
        assert_eq!(sink.layers().len(), (PER_SIDE * PER_SIDE) as usize);
        assert!(sink.writes.iter().all(|(_, s)| s.len() == (RES * RES) as usize));
    }

    #[test]
    fn first_update_only_anchors() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        let update = streamer.update(Vec2::new(100.0, -40.0), &mut sink).unwrap();
        assert!(update.is_idle());
        assert!(sink.writes.is_empty());
        assert_eq!(streamer.anchor(), Some(Vec2::new(100.0, -40.0)));
    }

    #[test]
    fn movement_must_exceed_one_chunk() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        streamer.update(Vec2::ZERO, &mut sink).unwrap();
        let update = streamer.update(Vec2::new(RES as f32, -(RES as f32)), &mut sink).unwrap();
        assert!(update.is_idle());
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn stepping_right_uploads_only_the_new_column() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        let origin = streamer.source().data_origin();
        streamer.update(Vec2::ZERO, &mut sink).unwrap();

        let update = streamer.update(Vec2::new(RES as f32 + 0.5, 0.0), &mut sink).unwrap();
        assert_eq!(update.x, Some(RingStep::Right));
        assert_eq!(update.z, None);

        let source = streamer.source();
        assert_eq!(source.data_origin(), origin + glam::IVec2::X);
        assert_eq!(sink.layers(), column_layers(source.right()));
        assert_eq!(sink.writes.len(), PER_SIDE as usize);

        // Uploaded samples belong to the newly revealed world chunks.
        for (layer, samples) in &sink.writes {
            let (x, y) = (layer % PER_SIDE, layer / PER_SIDE);
            assert_eq!(samples, &source.chunk_data(x, y).unwrap());
        }
        assert_eq!(streamer.anchor(), Some(Vec2::new(RES as f32, 0.0)));
    }

    #[test]
    fn stepping_left_and_up_move_data_origin_backwards() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        let origin = streamer.source().data_origin();
        streamer.update(Vec2::ZERO, &mut sink).unwrap();

        let update = streamer.update(Vec2::new(-5.0, -5.0), &mut sink).unwrap();
        assert_eq!(update.x, Some(RingStep::Left));
        assert_eq!(update.z, Some(RingStep::Up));

        let source = streamer.source();
        assert_eq!(source.data_origin(), origin - glam::IVec2::ONE);
        let mut expected = column_layers(source.left());
        expected.extend(row_layers(source.up()));
        assert_eq!(sink.layers(), expected);
    }

    #[test]
    fn diagonal_motion_steps_both_axes_in_one_frame() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        streamer.update(Vec2::ZERO, &mut sink).unwrap();
        let update = streamer.update(Vec2::new(4.5, 4.5), &mut sink).unwrap();
        assert_eq!(
            update,
            StreamUpdate {
                x: Some(RingStep::Right),
                z: Some(RingStep::Down),
            }
        );
        assert_eq!(sink.writes.len(), 2 * PER_SIDE as usize);
    }

    #[test]
    fn large_jump_converges_one_step_per_frame() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        let origin = streamer.source().data_origin();
        streamer.update(Vec2::ZERO, &mut sink).unwrap();

        let target = Vec2::new(5.5 * RES as f32, 0.0);
        let mut steps = 0;
        for _ in 0..10 {
            let update = streamer.update(target, &mut sink).unwrap();
            if update.x.is_some() {
                steps += 1;
            }
        }
        assert_eq!(steps, 5);
        assert_eq!(streamer.source().data_origin().x, origin.x + 5);
        assert_eq!(sink.writes.len(), 5 * PER_SIDE as usize);
    }

    /// Whether the ring currently holds the chunk under `camera`.
    fn ring_holds(streamer: &TerrainStreamer, camera: Vec2) -> bool {
        let chunk = (camera / streamer.chunk_world_size()).floor().as_ivec2();
        let rel = chunk - streamer.source().data_origin();
        let n = PER_SIDE as i32;
        (0..n).contains(&rel.x) && (0..n).contains(&rel.y)
    }

    #[test]
    fn swapped_source_follows_the_camera() {
        let mut streamer = streamer();
        let mut sink = RecordingSink::default();
        streamer.update(Vec2::ZERO, &mut sink).unwrap();

        let camera = Vec2::new(10.5 * RES as f32, 0.5);
        for _ in 0..20 {
            streamer.update(camera, &mut sink).unwrap();
        }
        assert!(ring_holds(&streamer, camera));
        let origin = streamer.source().data_origin();
        let anchor = streamer.anchor();

        let config = HeightmapConfig {
            seed: 7,
            ..Default::default()
        };
        let replacement = NoiseChunkGenerator::new(PER_SIDE, RES, config.clone()).unwrap();
        assert_ne!(replacement.data_origin(), origin);
        streamer.set_source(Box::new(replacement));

        assert_eq!(streamer.source().data_origin(), origin);
        assert_eq!(streamer.anchor(), anchor);
        for _ in 0..50 {
            streamer.update(camera, &mut sink).unwrap();
        }
        assert!(ring_holds(&streamer, camera));

        // Refilled slots hold the new source's samples for the chunks around the camera.
        let mut refill = RecordingSink::default();
        streamer.fill_all(&mut refill).unwrap();
        let source = streamer.source();
        let chunk = source.data_origin();
        let field = procgen::HeightField::new(config);
        let mut expected = Vec::new();
        let res = RES as i64;
        field.fill_block((chunk.x as i64 * res, chunk.y as i64 * res), RES, &mut expected);
        let layer = source.up() * PER_SIDE + source.left();
        let (_, samples) = refill.writes.iter().find(|(l, _)| *l == layer).unwrap();
        assert_eq!(samples, &expected);
    }

    fn count(pieces: &[DrawPiece], kind: MeshKind, level: u32) -> usize {
        pieces.iter().filter(|p| p.kind == kind && p.level == level).count()
    }

    #[test]
    fn piece_counts_per_level() {
        let layout = ClipmapLayout::new(3, 4);
        let pieces = layout.plan(Vec2::new(3.3, -7.1));

        assert_eq!(pieces.iter().filter(|p| p.kind == MeshKind::Cross).count(), 1);
        assert_eq!(count(&pieces, MeshKind::Tile, 0), 16);
        assert_eq!(count(&pieces, MeshKind::Tile, 1), 12);
        assert_eq!(count(&pieces, MeshKind::Tile, 2), 12);
        for level in 0..3 {
            assert_eq!(count(&pieces, MeshKind::Filler, level), 1);
        }
        // The outermost level has no parent to stitch to.
        for level in 0..2 {
            assert_eq!(count(&pieces, MeshKind::Trim, level), 1);
            assert_eq!(count(&pieces, MeshKind::Seam, level), 1);
        }
        assert_eq!(count(&pieces, MeshKind::Trim, 2), 0);
        assert_eq!(count(&pieces, MeshKind::Seam, 2), 0);
        assert_eq!(pieces.len(), 1 + 19 + 15 + 13);
        assert!(pieces.len() <= layout.max_pieces());
    }

    #[test]
    fn level_zero_tiles_leave_one_quad_gaps() {
        let layout = ClipmapLayout::new(1, 4);
        let pieces = layout.plan(Vec2::new(0.3, 0.7));
        let xs: HashSet<i32> = pieces
            .iter()
            .filter(|p| p.kind == MeshKind::Tile)
            .map(|p| p.offset.x as i32)
            .collect();
        assert_eq!(xs, HashSet::from([-8, -4, 1, 5]));

        let cross = pieces.iter().find(|p| p.kind == MeshKind::Cross).unwrap();
        assert_eq!(cross.offset, Vec2::ZERO);
        let filler = pieces.iter().find(|p| p.kind == MeshKind::Filler).unwrap();
        assert_eq!(filler.offset, Vec2::ZERO);
    }

    #[test]
    fn coarse_levels_skip_the_centre_tiles() {
        let r = 4.0;
        let layout = ClipmapLayout::new(2, 4);
        let camera = Vec2::new(-13.2, 22.9);
        let pieces = layout.plan(camera);
        let snapped = (camera / 2.0).floor() * 2.0;
        let inner_min = snapped - Vec2::splat(r * 2.0);
        let inner_max = snapped + Vec2::splat(r * 2.0 + 2.0);
        for tile in pieces.iter().filter(|p| p.kind == MeshKind::Tile && p.level == 1) {
            let inside = tile.offset.cmpge(inner_min).all() && tile.offset.cmplt(inner_max).all();
            assert!(!inside, "tile at {:?} overlaps the finer level", tile.offset);
            assert_eq!(tile.scale, 2.0);
        }
    }

    #[test]
    fn trim_rotation_flags() {
        assert_eq!(TrimRotation::for_offset(Vec2::new(1.5, 1.5), 1.0), TrimRotation::Identity);
        assert_eq!(TrimRotation::for_offset(Vec2::new(1.5, 0.5), 1.0), TrimRotation::Quarter);
        assert_eq!(TrimRotation::for_offset(Vec2::new(0.5, 1.5), 1.0), TrimRotation::ThreeQuarters);
        assert_eq!(TrimRotation::for_offset(Vec2::new(0.5, 0.5), 1.0), TrimRotation::Half);
        for index in 0..4 {
            assert_eq!(TrimRotation::from_index(index).index(), index);
        }
    }

    #[test]
    fn rotation_matrices_match_angles() {
        for rotation in [
            TrimRotation::Identity,
            TrimRotation::Quarter,
            TrimRotation::ThreeQuarters,
            TrimRotation::Half,
        ] {
            let theta = rotation.degrees().to_radians();
            let p = Vec2::new(2.0, 3.0);
            let expected = Vec2::new(
                p.x * theta.cos() + p.y * theta.sin(),
                -p.x * theta.sin() + p.y * theta.cos(),
            );
            assert!((rotation.apply(p) - expected).length() < 1e-5, "{:?}", rotation);
        }
    }

    #[test]
    fn trim_fills_the_gap_inside_the_parent_level() {
        let r = 2u32;
        let layout = ClipmapLayout::new(2, r);
        let trim_mesh = clipmap::generate(r).get(MeshKind::Trim).clone();
        let half = 0.5 * (clipmap_vert_resolution(r) + 1) as f32;

        for camera in [
            Vec2::new(0.5, 0.5),
            Vec2::new(1.5, 1.5),
            Vec2::new(0.5, 1.5),
            Vec2::new(1.5, 0.5),
            Vec2::new(-0.5, -3.2),
            Vec2::new(17.9, -6.1),
        ] {
            let pieces = layout.plan(camera);
            let trim = pieces.iter().find(|p| p.kind == MeshKind::Trim).unwrap();
            let next_snapped = (camera / 2.0).floor() * 2.0;
            let snapped = camera.floor();

            // The hole the parent level leaves for this level.
            let hole_min = next_snapped - Vec2::splat(2.0 * r as f32);
            let hole_max = next_snapped + Vec2::splat(2.0 * r as f32 + 2.0);

            let world: Vec<Vec2> = trim_mesh
                .vertices
                .iter()
                .map(|v| trim.offset + trim.rotation.apply(Vec2::from(v.position)) * trim.scale)
                .collect();
            let min = world.iter().fold(Vec2::splat(f32::MAX), |a, &b| a.min(b));
            let max = world.iter().fold(Vec2::splat(f32::MIN), |a, &b| a.max(b));
            assert_eq!((min, max), (hole_min, hole_max), "camera {:?}", camera);

            // The corner of the L sits on the side the level does not cover.
            let corner = trim.offset + trim.rotation.apply(Vec2::splat(-half)) * trim.scale;
            let expected = Vec2::new(
                if snapped.x == next_snapped.x { hole_max.x } else { hole_min.x },
                if snapped.y == next_snapped.y { hole_max.y } else { hole_min.y },
            );
            assert_eq!(corner, expected, "camera {:?}", camera);
        }
    }

    #[test]
    fn seam_frames_the_parent_hole() {
        let layout = ClipmapLayout::new(3, 8);
        let camera = Vec2::new(40.2, -3.3);
        for piece in layout.plan(camera).iter().filter(|p| p.kind == MeshKind::Seam) {
            let next_scale = piece.scale * 2.0;
            let next_snapped = (camera / next_scale).floor() * next_scale;
            assert_eq!(piece.offset, next_snapped - Vec2::splat(16.0 * piece.scale));
        }
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<TerrainUniform>(), 128);
    }
}
