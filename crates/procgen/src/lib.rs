//! Procedural heightmap generation and the ring-addressed chunk source the terrain streams from.

pub mod chunks;
pub mod terrain;

pub use chunks::*;
pub use terrain::*;
