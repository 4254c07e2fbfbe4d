//! Typed renderer errors.

use procgen::ChunkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("heightmap array needs {requested} layers but the device allows {max}")]
    TooManyLayers { requested: u32, max: u32 },
    #[error("layer {layer} is out of range for an array of {layers} layers")]
    LayerOutOfRange { layer: u32, layers: u32 },
    #[error("layer data has {got} samples, expected {expected}")]
    LayerSize { got: usize, expected: usize },
    #[error("chunk source is {got_side}x{got_side} at {got_res} samples, renderer expects {want_side}x{want_side} at {want_res}")]
    SourceMismatch {
        got_side: u32,
        got_res: u32,
        want_side: u32,
        want_res: u32,
    },
    #[error("shader '{0}' could not be loaded")]
    Shader(String),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error(transparent)]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}
