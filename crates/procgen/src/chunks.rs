//! Ring-addressed heightmap chunks around a moving viewpoint.
//!
//! The ring is an N×N grid of physical slots (one texture-array layer each). Slots are
//! never moved; scrolling the ring rotates the `left`/`up` boundaries and shifts the data
//! origin so that only the row or column that wrapped around needs new samples.

use glam::{IVec2, UVec2};
use thiserror::Error;

use crate::terrain::{HeightField, HeightmapConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk grid needs at least one chunk per side")]
    EmptyGrid,
    #[error("chunk resolution must be non-zero")]
    ZeroResolution,
    #[error("slot ({x}, {y}) is outside a {per_side}x{per_side} ring")]
    SlotOutOfRange { x: u32, y: u32, per_side: u32 },
}

/// Source of heightmap chunks for the terrain renderer.
///
/// Slot coordinates are physical ring positions; `layer = y * chunks_per_side + x`.
pub trait ChunkSource {
    fn chunks_per_side(&self) -> u32;

    /// Total number of slots (texture-array layers).
    fn chunks_amount(&self) -> u32 {
        self.chunks_per_side() * self.chunks_per_side()
    }

    /// Samples per chunk side.
    fn chunk_resolution(&self) -> u32;

    /// Slot column holding the ring's western-most world column.
    fn left(&self) -> u32;
    /// Slot column holding the ring's eastern-most world column.
    fn right(&self) -> u32;
    /// Slot row holding the ring's northern-most (smallest z) world row.
    fn up(&self) -> u32;
    /// Slot row holding the ring's southern-most (largest z) world row.
    fn down(&self) -> u32;

    /// World chunk coordinate held by slot (left, up).
    fn data_origin(&self) -> IVec2;

    fn update_left(&mut self);
    fn update_right(&mut self);
    fn update_up(&mut self);
    fn update_down(&mut self);

    /// Raw samples for slot (x, y), row-major, `chunk_resolution²` values.
    fn chunk_data(&self, x: u32, y: u32) -> Result<Vec<f32>, ChunkError>;
}

/// Pure ring addressing: maps physical slots to world chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRing {
    per_side: u32,
    left: u32,
    up: u32,
    origin: IVec2,
}

impl ChunkRing {
    pub fn new(per_side: u32, origin: IVec2) -> Result<Self, ChunkError> {
        if per_side == 0 {
            return Err(ChunkError::EmptyGrid);
        }
        Ok(Self { per_side, left: 0, up: 0, origin })
    }

    /// Ring whose centre slot covers world chunk (0, 0).
    pub fn centered(per_side: u32) -> Result<Self, ChunkError> {
        let half = (per_side / 2) as i32;
        Self::new(per_side, IVec2::new(-half, -half))
    }

    pub fn per_side(&self) -> u32 {
        self.per_side
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn right(&self) -> u32 {
        (self.left + self.per_side - 1) % self.per_side
    }

    pub fn up(&self) -> u32 {
        self.up
    }

    pub fn down(&self) -> u32 {
        (self.up + self.per_side - 1) % self.per_side
    }

    pub fn origin(&self) -> IVec2 {
        self.origin
    }

    pub fn shift_right(&mut self) {
        self.origin.x += 1;
        self.left = (self.left + 1) % self.per_side;
    }

    pub fn shift_left(&mut self) {
        self.origin.x -= 1;
        self.left = (self.left + self.per_side - 1) % self.per_side;
    }

    pub fn shift_down(&mut self) {
        self.origin.y += 1;
        self.up = (self.up + 1) % self.per_side;
    }

    pub fn shift_up(&mut self) {
        self.origin.y -= 1;
        self.up = (self.up + self.per_side - 1) % self.per_side;
    }

    pub fn layer(&self, x: u32, y: u32) -> u32 {
        y * self.per_side + x
    }

    /// World chunk coordinate currently mapped to slot (x, y).
    pub fn world_chunk(&self, x: u32, y: u32) -> Result<IVec2, ChunkError> {
        if x >= self.per_side || y >= self.per_side {
            return Err(ChunkError::SlotOutOfRange { x, y, per_side: self.per_side });
        }
        let n = self.per_side;
        let dx = (x + n - self.left) % n;
        let dy = (y + n - self.up) % n;
        Ok(self.origin + IVec2::new(dx as i32, dy as i32))
    }

    /// Slot holding world chunk `chunk`, if it is inside the ring.
    pub fn slot_of(&self, chunk: IVec2) -> Option<UVec2> {
        let rel = chunk - self.origin;
        let n = self.per_side as i32;
        if rel.x < 0 || rel.y < 0 || rel.x >= n || rel.y >= n {
            return None;
        }
        Some(UVec2::new(
            (rel.x as u32 + self.left) % self.per_side,
            (rel.y as u32 + self.up) % self.per_side,
        ))
    }
}

/// Chunk source that computes samples from deterministic fractal noise.
#[derive(Debug)]
pub struct NoiseChunkGenerator {
    ring: ChunkRing,
    resolution: u32,
    field: HeightField,
}

impl NoiseChunkGenerator {
    pub fn new(
        chunks_per_side: u32,
        resolution: u32,
        config: HeightmapConfig,
    ) -> Result<Self, ChunkError> {
        if resolution == 0 {
            return Err(ChunkError::ZeroResolution);
        }
        let ring = ChunkRing::centered(chunks_per_side)?;
        log::debug!(
            "Chunk ring {}x{} at origin {:?}, {} samples per side, seed {}",
            chunks_per_side,
            chunks_per_side,
            ring.origin(),
            resolution,
            config.seed
        );
        Ok(Self {
            ring,
            resolution,
            field: HeightField::new(config),
        })
    }

    pub fn ring(&self) -> &ChunkRing {
        &self.ring
    }

    pub fn field(&self) -> &HeightField {
        &self.field
    }
}

impl ChunkSource for NoiseChunkGenerator {
    fn chunks_per_side(&self) -> u32 {
        self.ring.per_side()
    }

    fn chunk_resolution(&self) -> u32 {
        self.resolution
    }

    fn left(&self) -> u32 {
        self.ring.left()
    }

    fn right(&self) -> u32 {
        self.ring.right()
    }

    fn up(&self) -> u32 {
        self.ring.up()
    }

    fn down(&self) -> u32 {
        self.ring.down()
    }

    fn data_origin(&self) -> IVec2 {
        self.ring.origin()
    }

    fn update_left(&mut self) {
        self.ring.shift_left();
    }

    fn update_right(&mut self) {
        self.ring.shift_right();
    }

    fn update_up(&mut self) {
        self.ring.shift_up();
    }

    fn update_down(&mut self) {
        self.ring.shift_down();
    }

    fn chunk_data(&self, x: u32, y: u32) -> Result<Vec<f32>, ChunkError> {
        let chunk = self.ring.world_chunk(x, y)?;
        let res = self.resolution as i64;
        let mut samples = Vec::new();
        self.field
            .fill_block((chunk.x as i64 * res, chunk.y as i64 * res), self.resolution, &mut samples);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_and_zero_resolution_are_rejected() {
        assert_eq!(ChunkRing::new(0, IVec2::ZERO).unwrap_err(), ChunkError::EmptyGrid);
        let err = NoiseChunkGenerator::new(4, 0, HeightmapConfig::default()).unwrap_err();
        assert_eq!(err, ChunkError::ZeroResolution);
    }

    #[test]
    fn centered_ring_covers_world_origin() {
        let ring = ChunkRing::centered(5).unwrap();
        assert_eq!(ring.origin(), IVec2::new(-2, -2));
        assert_eq!(ring.slot_of(IVec2::ZERO), Some(UVec2::new(2, 2)));
        assert_eq!(ring.right(), 4);
        assert_eq!(ring.down(), 4);
    }

    #[test]
    fn shift_right_recycles_left_column() {
        let mut ring = ChunkRing::new(4, IVec2::ZERO).unwrap();
        let old_left = ring.left();
        ring.shift_right();
        // The slot that held the western column now holds the new eastern column.
        assert_eq!(ring.right(), old_left);
        assert_eq!(ring.world_chunk(ring.right(), 0).unwrap(), IVec2::new(4, 0));
        assert_eq!(ring.world_chunk(ring.left(), 0).unwrap(), IVec2::new(1, 0));
        assert_eq!(ring.origin(), IVec2::new(1, 0));
    }

    #[test]
    fn shift_left_and_up_wrap_around() {
        let mut ring = ChunkRing::new(3, IVec2::new(10, 10)).unwrap();
        ring.shift_left();
        ring.shift_up();
        assert_eq!(ring.left(), 2);
        assert_eq!(ring.up(), 2);
        assert_eq!(ring.world_chunk(2, 2).unwrap(), IVec2::new(9, 9));
        assert_eq!(ring.world_chunk(1, 1).unwrap(), IVec2::new(11, 11));
    }

    #[test]
    fn opposite_shifts_cancel() {
        let start = ChunkRing::centered(6).unwrap();
        let mut ring = start;
        ring.shift_right();
        ring.shift_down();
        ring.shift_left();
        ring.shift_up();
        assert_eq!(ring, start);
    }

    #[test]
    fn slot_of_inverts_world_chunk() {
        let mut ring = ChunkRing::centered(4).unwrap();
        ring.shift_right();
        ring.shift_right();
        ring.shift_up();
        for y in 0..4 {
            for x in 0..4 {
                let chunk = ring.world_chunk(x, y).unwrap();
                assert_eq!(ring.slot_of(chunk), Some(UVec2::new(x, y)));
            }
        }
        assert_eq!(ring.slot_of(ring.origin() - IVec2::ONE), None);
    }

    #[test]
    fn out_of_range_slot_is_an_error() {
        let generator = NoiseChunkGenerator::new(2, 8, HeightmapConfig::default()).unwrap();
        assert!(matches!(
            generator.chunk_data(2, 0),
            Err(ChunkError::SlotOutOfRange { x: 2, y: 0, per_side: 2 })
        ));
    }

    #[test]
    fn chunk_data_follows_world_chunk_not_slot() {
        let config = HeightmapConfig { seed: 42, ..Default::default() };
        let mut generator = NoiseChunkGenerator::new(3, 16, config).unwrap();
        // World chunk (1, -1) is the eastern column before the shift...
        let before = generator.chunk_data(generator.right(), generator.up()).unwrap();
        generator.update_right();
        // ...and sits one column further west after it.
        let slot = generator.ring().slot_of(IVec2::new(1, -1)).unwrap();
        let after = generator.chunk_data(slot.x, slot.y).unwrap();
        assert_eq!(before, after);
        assert_eq!(after.len(), 16 * 16);
    }

    #[test]
    fn chunk_samples_match_heightfield() {
        let generator = NoiseChunkGenerator::new(2, 8, HeightmapConfig { seed: 7, ..Default::default() }).unwrap();
        let chunk = generator.ring().world_chunk(1, 0).unwrap();
        let data = generator.chunk_data(1, 0).unwrap();
        let (cx, cz) = (chunk.x as i64 * 8, chunk.y as i64 * 8);
        assert_eq!(data[0], generator.field().sample(cx, cz));
        assert_eq!(data[8 * 3 + 5], generator.field().sample(cx + 5, cz + 3));
    }
}
