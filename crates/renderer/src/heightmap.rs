//! Heightmap texture array: one R32Float layer per chunk slot of the streaming ring.

use crate::error::RendererError;

/// Destination for chunk samples. The streamer only ever talks to this trait, so the ring logic
/// runs the same against the GPU array and against a recording sink in tests.
pub trait LayerSink {
    fn write_layer(&mut self, layer: u32, samples: &[f32]);
}

/// `resolution × resolution × layers` R32Float texture array sampled with `textureLoad`.
pub struct HeightmapArray {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    resolution: u32,
    layers: u32,
}

impl HeightmapArray {
    pub fn new(device: &wgpu::Device, resolution: u32, layers: u32, max_layers: u32) -> Result<Self, RendererError> {
        if layers > max_layers {
            return Err(RendererError::TooManyLayers {
                requested: layers,
                max: max_layers,
            });
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Heightmap Array"),
            size: wgpu::Extent3d {
                width: resolution.max(1),
                height: resolution.max(1),
                depth_or_array_layers: layers.max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Heightmap Array View"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        log::debug!("Heightmap array {}x{} with {} layers", resolution, resolution, layers);

        Ok(Self {
            texture,
            view,
            resolution,
            layers,
        })
    }

    /// Replace one layer. `samples` is row-major with `resolution²` values.
    pub fn write_layer(&self, queue: &wgpu::Queue, layer: u32, samples: &[f32]) -> Result<(), RendererError> {
        check_layer(layer, self.layers, samples.len(), self.resolution)?;

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(samples),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.resolution),
                rows_per_image: Some(self.resolution),
            },
            wgpu::Extent3d {
                width: self.resolution,
                height: self.resolution,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }
}

fn check_layer(layer: u32, layers: u32, samples: usize, resolution: u32) -> Result<(), RendererError> {
    if layer >= layers {
        return Err(RendererError::LayerOutOfRange { layer, layers });
    }
    let expected = (resolution * resolution) as usize;
    if samples != expected {
        return Err(RendererError::LayerSize { got: samples, expected });
    }
    Ok(())
}

/// Sink that forwards layers to the GPU array for the duration of one update.
pub struct HeightmapUpload<'a> {
    pub array: &'a HeightmapArray,
    pub queue: &'a wgpu::Queue,
}

impl LayerSink for HeightmapUpload<'_> {
    fn write_layer(&mut self, layer: u32, samples: &[f32]) {
        if let Err(e) = self.array.write_layer(self.queue, layer, samples) {
            log::error!("Heightmap upload failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_checks_reject_bad_uploads() {
        assert!(check_layer(3, 4, 16, 4).is_ok());
        assert!(matches!(
            check_layer(4, 4, 16, 4),
            Err(RendererError::LayerOutOfRange { layer: 4, layers: 4 })
        ));
        assert!(matches!(
            check_layer(0, 4, 15, 4),
            Err(RendererError::LayerSize { got: 15, expected: 16 })
        ));
    }
}
