//! Geoclipmap mesh pieces.
//!
//! Every LOD level is assembled from the same five grid meshes, generated once from the tile
//! resolution `R` and scaled by `2^level` at draw time:
//!
//! - **tile**: an R×R quad patch; 16 of them (12 for coarser levels) form a level.
//! - **filler**: four one-quad-wide arms plugging the gaps between the outer tiles.
//! - **cross**: the same gaps through the centre of the finest level.
//! - **trim**: an L-shaped strip closing the one-quad slack between a level and its parent.
//! - **seam**: a ring of triangles along a level's outer edge that hides T-junctions
//!   against the next coarser level.
//!
//! A level spans `clipmap_resolution = 4R + 1` quads; the hole a coarser level leaves for it
//! spans `clipmap_vert_resolution = 4R + 2` of the finer level's quads.

use crate::{mesh::Mesh, vertex::GridVertex};

/// The five mesh kinds shared across all levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshKind {
    Cross,
    Tile,
    Filler,
    Trim,
    Seam,
}

impl MeshKind {
    pub const ALL: [MeshKind; 5] = [
        MeshKind::Cross,
        MeshKind::Tile,
        MeshKind::Filler,
        MeshKind::Trim,
        MeshKind::Seam,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Color used when debug coloring is enabled.
    pub fn debug_color(self) -> [f32; 3] {
        match self {
            MeshKind::Cross => [1.0, 1.0, 1.0],
            MeshKind::Tile => [0.0, 1.0, 1.0],
            MeshKind::Filler => [0.0, 1.0, 0.0],
            MeshKind::Trim => [0.0, 0.0, 1.0],
            MeshKind::Seam => [1.0, 0.0, 0.0],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MeshKind::Cross => "Clipmap Cross",
            MeshKind::Tile => "Clipmap Tile",
            MeshKind::Filler => "Clipmap Filler",
            MeshKind::Trim => "Clipmap Trim",
            MeshKind::Seam => "Clipmap Seam",
        }
    }
}

/// One CPU-side grid mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridMesh {
    pub vertices: Vec<GridVertex>,
    pub indices: Vec<u32>,
}

impl GridMesh {
    fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
        }
    }

    fn push(&mut self, x: f32, z: f32) {
        self.vertices.push(GridVertex::new(x, z));
    }

    /// Axis-aligned bounds as (min, max).
    pub fn bounds(&self) -> ([f32; 2], [f32; 2]) {
        let mut min = [f32::MAX; 2];
        let mut max = [f32::MIN; 2];
        for v in &self.vertices {
            for axis in 0..2 {
                min[axis] = min[axis].min(v.position[axis]);
                max[axis] = max[axis].max(v.position[axis]);
            }
        }
        (min, max)
    }
}

/// The generated CPU-side mesh set, indexed by [`MeshKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClipmapMeshSet {
    pub tile_resolution: u32,
    meshes: [GridMesh; 5],
}

impl ClipmapMeshSet {
    pub fn get(&self, kind: MeshKind) -> &GridMesh {
        &self.meshes[kind.index()]
    }

    /// Quads per level side.
    pub fn clipmap_resolution(&self) -> u32 {
        clipmap_resolution(self.tile_resolution)
    }
}

pub fn clipmap_resolution(tile_resolution: u32) -> u32 {
    tile_resolution * 4 + 1
}

pub fn clipmap_vert_resolution(tile_resolution: u32) -> u32 {
    clipmap_resolution(tile_resolution) + 1
}

/// Build all five pieces for the given tile resolution (quads per tile side, ≥ 1).
pub fn generate(tile_resolution: u32) -> ClipmapMeshSet {
    let r = tile_resolution.max(1);
    let mut meshes: [GridMesh; 5] = Default::default();
    meshes[MeshKind::Tile.index()] = tile_mesh(r);
    meshes[MeshKind::Filler.index()] = filler_mesh(r);
    meshes[MeshKind::Cross.index()] = cross_mesh(r);
    meshes[MeshKind::Trim.index()] = trim_mesh(r);
    meshes[MeshKind::Seam.index()] = seam_mesh(r);
    ClipmapMeshSet { tile_resolution: r, meshes }
}

fn tile_mesh(r: u32) -> GridMesh {
    let verts = r + 1;
    let mut mesh = GridMesh::with_capacity((verts * verts) as usize, (r * r * 6) as usize);

    for y in 0..verts {
        for x in 0..verts {
            mesh.push(x as f32, y as f32);
        }
    }

    let at = |x: u32, y: u32| y * verts + x;
    for y in 0..r {
        for x in 0..r {
            mesh.indices.extend_from_slice(&[
                at(x, y),
                at(x + 1, y + 1),
                at(x, y + 1),
                at(x, y),
                at(x + 1, y),
                at(x + 1, y + 1),
            ]);
        }
    }
    mesh
}

fn filler_mesh(r: u32) -> GridMesh {
    let verts = r + 1;
    let offset = r as f32;
    let mut mesh = GridMesh::with_capacity((verts * 8) as usize, (r * 24) as usize);

    // +x arm
    for i in 0..verts {
        let along = offset + i as f32 + 1.0;
        mesh.push(along, 0.0);
        mesh.push(along, 1.0);
    }
    // +z arm
    for i in 0..verts {
        let along = offset + i as f32 + 1.0;
        mesh.push(1.0, along);
        mesh.push(0.0, along);
    }
    // -x arm
    for i in 0..verts {
        let along = -(offset + i as f32);
        mesh.push(along, 1.0);
        mesh.push(along, 0.0);
    }
    // -z arm
    for i in 0..verts {
        let along = -(offset + i as f32);
        mesh.push(0.0, along);
        mesh.push(1.0, along);
    }

    for i in 0..r * 4 {
        // Skipping one vertex pair per arm keeps the arms disconnected.
        let arm = i / r;
        let bl = (arm + i) * 2;
        let br = bl + 1;
        let tl = bl + 2;
        let tr = bl + 3;

        if arm % 2 == 0 {
            mesh.indices.extend_from_slice(&[br, bl, tr, bl, tl, tr]);
        } else {
            mesh.indices.extend_from_slice(&[br, bl, tl, br, tl, tr]);
        }
    }
    mesh
}

fn cross_mesh(r: u32) -> GridMesh {
    let verts = r + 1;
    let mut mesh = GridMesh::with_capacity((verts * 8) as usize, (r * 24 + 6) as usize);

    // Horizontal strip
    for i in 0..verts * 2 {
        let along = i as f32 - r as f32;
        mesh.push(along, 0.0);
        mesh.push(along, 1.0);
    }

    let start_of_vertical = mesh.vertices.len() as u32;

    // Vertical strip
    for i in 0..verts * 2 {
        let along = i as f32 - r as f32;
        mesh.push(0.0, along);
        mesh.push(1.0, along);
    }

    for i in 0..r * 2 + 1 {
        let bl = i * 2;
        let br = bl + 1;
        let tl = bl + 2;
        let tr = bl + 3;
        mesh.indices.extend_from_slice(&[br, bl, tr, bl, tl, tr]);
    }

    for i in 0..r * 2 + 1 {
        // The centre quad already belongs to the horizontal strip.
        if i == r {
            continue;
        }
        let bl = start_of_vertical + i * 2;
        let br = bl + 1;
        let tl = bl + 2;
        let tr = bl + 3;
        mesh.indices.extend_from_slice(&[br, tr, bl, bl, tr, tl]);
    }
    mesh
}

fn trim_mesh(r: u32) -> GridMesh {
    let cvr = clipmap_vert_resolution(r);
    let mut mesh = GridMesh::with_capacity(((cvr * 2 + 1) * 2) as usize, ((cvr * 2 - 1) * 6) as usize);

    // Vertical part of the L
    for i in 0..=cvr {
        let along = (cvr - i) as f32;
        mesh.push(0.0, along);
        mesh.push(1.0, along);
    }

    let start_of_horizontal = mesh.vertices.len() as u32;

    // Horizontal part of the L
    for i in 0..cvr {
        let along = (i + 1) as f32;
        mesh.push(along, 0.0);
        mesh.push(along, 1.0);
    }

    // Shift so rotations pivot around the level centre.
    let half = 0.5 * (cvr + 1) as f32;
    for v in &mut mesh.vertices {
        v.position[0] -= half;
        v.position[1] -= half;
    }

    for i in 0..cvr {
        mesh.indices.extend_from_slice(&[
            i * 2 + 1,
            i * 2,
            (i + 1) * 2,
            (i + 1) * 2 + 1,
            i * 2 + 1,
            (i + 1) * 2,
        ]);
    }
    for i in 0..cvr - 1 {
        let base = start_of_horizontal;
        mesh.indices.extend_from_slice(&[
            base + i * 2 + 1,
            base + i * 2,
            base + (i + 1) * 2,
            base + (i + 1) * 2 + 1,
            base + i * 2 + 1,
            base + (i + 1) * 2,
        ]);
    }
    mesh
}

fn seam_mesh(r: u32) -> GridMesh {
    let cvr = clipmap_vert_resolution(r);
    let mut mesh = GridMesh::with_capacity((cvr * 4) as usize, (cvr * 6) as usize);
    mesh.vertices.resize((cvr * 4) as usize, GridVertex::new(0.0, 0.0));

    let n = cvr as usize;
    for i in 0..n {
        let f = i as f32;
        let c = cvr as f32;
        mesh.vertices[i] = GridVertex::new(f, 0.0);
        mesh.vertices[n + i] = GridVertex::new(c, f);
        mesh.vertices[n * 2 + i] = GridVertex::new(c - f, c);
        mesh.vertices[n * 3 + i] = GridVertex::new(0.0, c - f);
    }

    for i in (0..cvr * 4).step_by(2) {
        mesh.indices.extend_from_slice(&[i + 1, i, i + 2]);
    }
    // The last triangle wraps around to the first vertex.
    if let Some(last) = mesh.indices.last_mut() {
        *last = 0;
    }
    mesh
}

/// GPU copies of the five pieces.
pub struct ClipmapMeshes {
    meshes: Vec<Mesh>,
}

impl ClipmapMeshes {
    pub fn upload(device: &wgpu::Device, set: &ClipmapMeshSet) -> Self {
        let meshes = MeshKind::ALL
            .iter()
            .map(|&kind| {
                let mesh = set.get(kind);
                Mesh::from_raw(device, kind.label(), &mesh.vertices, &mesh.indices)
            })
            .collect();
        Self { meshes }
    }

    pub fn get(&self, kind: MeshKind) -> &Mesh {
        &self.meshes[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(mesh: &GridMesh) {
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(
            mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()),
            "index out of range"
        );
    }

    #[test]
    fn piece_sizes_follow_tile_resolution() {
        for r in [1, 2, 8, 31] {
            let set = generate(r);
            let cvr = clipmap_vert_resolution(r) as usize;
            let r = r as usize;
            let tile = set.get(MeshKind::Tile);
            assert_eq!(tile.vertices.len(), (r + 1) * (r + 1));
            assert_eq!(tile.indices.len(), r * r * 6);
            assert_eq!(set.get(MeshKind::Filler).indices.len(), r * 24);
            assert_eq!(set.get(MeshKind::Cross).indices.len(), r * 24 + 6);
            assert_eq!(set.get(MeshKind::Trim).vertices.len(), (cvr * 2 + 1) * 2);
            assert_eq!(set.get(MeshKind::Trim).indices.len(), (cvr * 2 - 1) * 6);
            assert_eq!(set.get(MeshKind::Seam).indices.len(), cvr * 6);
            for kind in MeshKind::ALL {
                assert_valid(set.get(kind));
            }
        }
    }

    #[test]
    fn tile_spans_r_quads() {
        let set = generate(16);
        let (min, max) = set.get(MeshKind::Tile).bounds();
        assert_eq!(min, [0.0, 0.0]);
        assert_eq!(max, [16.0, 16.0]);
    }

    #[test]
    fn filler_arms_are_not_connected() {
        let r = 4u32;
        let set = generate(r);
        let filler = set.get(MeshKind::Filler);
        let per_arm = (r + 1) * 2;
        for tri in filler.indices.chunks(3) {
            let arm = tri[0] / per_arm;
            assert!(tri.iter().all(|&i| i / per_arm == arm), "triangle {:?} spans arms", tri);
        }
    }

    #[test]
    fn filler_covers_gaps_between_outer_tiles() {
        let r = 8;
        let (min, max) = generate(r).get(MeshKind::Filler).bounds();
        // Outer tiles reach 2R quads (plus the one-quad gap) from the level centre.
        assert_eq!(min, [-(2.0 * r as f32), -(2.0 * r as f32)]);
        assert_eq!(max, [2.0 * r as f32 + 1.0, 2.0 * r as f32 + 1.0]);
    }

    #[test]
    fn cross_skips_the_shared_centre_quad() {
        let r = 3;
        let cross = generate(r).get(MeshKind::Cross).clone();
        // 2R+1 horizontal quads, 2R vertical quads
        assert_eq!(cross.indices.len() / 6, (2 * r + 1 + 2 * r) as usize);
        let (min, max) = cross.bounds();
        assert_eq!(min, [-(r as f32), -(r as f32)]);
        assert_eq!(max, [r as f32 + 1.0, r as f32 + 1.0]);
    }

    #[test]
    fn trim_is_l_one_quad_wide_around_level_centre() {
        let r = 8;
        let cvr = clipmap_vert_resolution(r) as f32;
        let trim = generate(r).get(MeshKind::Trim).clone();
        let (min, max) = trim.bounds();
        // Offset by half a quad: the level centre sits half a quad past the snapped position.
        let half = 0.5 * (cvr + 1.0);
        assert_eq!(min, [-half, -half]);
        assert_eq!(max, [half - 1.0, half - 1.0]);
        // Every vertex lies on one of the two arms.
        for v in &trim.vertices {
            let [x, z] = v.position;
            assert!(x <= -half + 1.0 || z <= -half + 1.0, "vertex {:?} off the L", v.position);
        }
    }

    #[test]
    fn seam_wraps_back_to_first_vertex() {
        let set = generate(2);
        let seam = set.get(MeshKind::Seam);
        assert_eq!(seam.indices.last(), Some(&0));
        let cvr = clipmap_vert_resolution(2) as f32;
        assert_eq!(seam.bounds(), ([0.0, 0.0], [cvr, cvr]));
    }

    #[test]
    fn zero_resolution_is_promoted_to_one() {
        assert_eq!(generate(0).tile_resolution, 1);
    }
}
