//! wgpu rendering: streaming geoclipmap terrain, forward lighting and instanced batches.

pub mod batch;
pub mod camera;
pub mod clipmap;
pub mod error;
pub mod heightmap;
pub mod lighting;
pub mod mesh;
pub mod pipeline;
pub mod renderer;
pub mod terrain;
pub mod texture;
pub mod vertex;

pub use batch::*;
pub use camera::*;
pub use clipmap::{ClipmapMeshSet, ClipmapMeshes, GridMesh, MeshKind};
pub use error::RendererError;
pub use heightmap::*;
pub use lighting::*;
pub use mesh::*;
pub use pipeline::*;
pub use renderer::*;
pub use terrain::*;
pub use texture::*;
pub use vertex::*;
