// ============================================================================
// RENDER SURFACE — offscreen colour target standing in for the canvas
// ============================================================================

use super::context::GpuContext;
use crate::error::RenderError;
use crate::geometry::SurfaceSize;
use crate::request::RenderedFrame;

pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Persistent output target.  Recreated only when its size changes.
pub struct RenderSurface {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: SurfaceSize,
    /// Cached staging buffer for readback, with its byte size.
    staging: Option<(wgpu::Buffer, u64)>,
}

impl RenderSurface {
    pub fn new(ctx: &GpuContext, size: SurfaceSize) -> Result<Self, RenderError> {
        if size.width == 0 || size.height == 0 || !ctx.supports_size(size.width, size.height) {
            return Err(RenderError::InvalidSurface { width: size.width, height: size.height });
        }
        let bytes = readback_bytes(size);
        if bytes > ctx.max_buffer_size {
            return Err(RenderError::ReadbackTooLarge {
                width: size.width,
                height: size.height,
                bytes,
                max: ctx.max_buffer_size,
            });
        }
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_surface"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self { texture, view, size, staging: None })
    }

    /// Bring `slot` to `size`, creating or replacing the surface as needed.
    pub fn resize_to(
        slot: &mut Option<RenderSurface>,
        ctx: &GpuContext,
        size: SurfaceSize,
    ) -> Result<(), RenderError> {
        if slot.as_ref().is_some_and(|s| s.size == size) {
            return Ok(());
        }
        *slot = Some(RenderSurface::new(ctx, size)?);
        log::debug!("render surface resized to {}x{}", size.width, size.height);
        Ok(())
    }

    /// Copy the surface to the CPU.  Blocks until the GPU has finished all
    /// previously submitted work.
    pub fn read_pixels(&mut self, ctx: &GpuContext) -> Result<RenderedFrame, RenderError> {
        let device = &ctx.device;
        let SurfaceSize { width, height } = self.size;

        let bytes_per_row = aligned_bytes_per_row(width);
        let buffer_size = readback_bytes(self.size);
        if buffer_size > ctx.max_buffer_size {
            return Err(RenderError::ReadbackTooLarge {
                width,
                height,
                bytes: buffer_size,
                max: ctx.max_buffer_size,
            });
        }

        let need_new = !matches!(&self.staging, Some((_, sz)) if *sz >= buffer_size);
        if need_new {
            self.staging = None;
            device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("surface_readback_staging"),
                size: buffer_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let validation = pollster::block_on(device.pop_error_scope());
            let oom = pollster::block_on(device.pop_error_scope());
            if let Some(err) = validation.or(oom) {
                return Err(RenderError::Readback(err.to_string()));
            }
            self.staging = Some((buf, buffer_size));
        }
        let Some((staging, _)) = self.staging.as_ref() else {
            return Err(RenderError::Readback("staging buffer missing".into()));
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("surface_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        ctx.submit_one(encoder);

        let slice = staging.slice(..buffer_size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderError::Readback(e.to_string())),
            Err(e) => return Err(RenderError::Readback(e.to_string())),
        }

        let mapped = slice.get_mapped_range();
        let tight_row = (width * 4) as usize;
        let mut pixels = Vec::with_capacity(tight_row * height as usize);
        for row in mapped.chunks_exact(bytes_per_row as usize).take(height as usize) {
            pixels.extend_from_slice(&row[..tight_row]);
        }
        drop(mapped);
        staging.unmap();

        Ok(RenderedFrame { width, height, pixels })
    }
}

/// Staging buffer size for reading back a surface of `size`.
pub fn readback_bytes(size: SurfaceSize) -> u64 {
    aligned_bytes_per_row(size.width) as u64 * size.height as u64
}

/// WGPU requires `bytes_per_row` of buffer copies to be a multiple of 256.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_align_to_256() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
        assert_eq!(aligned_bytes_per_row(800), 3328);
    }

    #[test]
    fn readback_size_does_not_wrap() {
        assert_eq!(readback_bytes(SurfaceSize::new(2, 3)), 768);
        // 32768 * 4 bytes per row * 32768 rows = 4 GiB, past u32.
        assert_eq!(readback_bytes(SurfaceSize::new(32768, 32768)), 1u64 << 32);
        assert!(readback_bytes(SurfaceSize::new(9000, 8000)) > 256 << 20);
    }
}
