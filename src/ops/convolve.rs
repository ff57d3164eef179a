// ============================================================================
// CONVOLUTION — GPU dispatch with a CPU path that mirrors the shaders
// ============================================================================
//
// `convolve_cpu` reproduces what the rasterizer + fragment stage produce:
// pixel centres inside the rect are shaded, everything else stays
// transparent black; UVs are interpolated from the quad; taps use nearest
// sampling with clamp-to-edge; alpha is forced to 1.  It is the fallback
// when no adapter exists and the oracle the GPU output is checked against.

use rayon::prelude::*;

use crate::error::RenderError;
use crate::geometry::Layout;
use crate::gpu::ConvolutionRenderer;
use crate::request::{RenderRequest, RenderedFrame, SourceImage};

/// Convolve on the GPU when a renderer is available, otherwise on the CPU.
pub fn apply_kernel(
    request: &RenderRequest,
    layout: &Layout,
    gpu: Option<&mut ConvolutionRenderer>,
) -> Result<RenderedFrame, RenderError> {
    match gpu {
        Some(renderer) => renderer.render_to_frame(request, layout),
        None => convolve_cpu(request, layout),
    }
}

/// CPU rendition of one render call.
pub fn convolve_cpu(request: &RenderRequest, layout: &Layout) -> Result<RenderedFrame, RenderError> {
    let image = &request.image;
    let (width, height) = (layout.surface.width, layout.surface.height);
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidSurface { width, height });
    }
    if image.width == 0 || image.height == 0 {
        return Err(RenderError::EmptyImage);
    }
    let expected = image.width as usize * image.height as usize * 4;
    if image.pixels.len() != expected {
        return Err(RenderError::PixelBufferSize { expected, actual: image.pixels.len() });
    }

    let rect = layout.rect;
    let kernel = request.kernel;
    let one_pixel = [1.0 / image.width as f32, 1.0 / image.height as f32];
    let stride = width as usize * 4;
    let mut pixels = vec![0u8; stride * height as usize];

    // Parallel by row.
    pixels.par_chunks_mut(stride).enumerate().for_each(|(py, row_out)| {
        let cy = py as f32 + 0.5;
        for px in 0..width as usize {
            let cx = px as f32 + 0.5;
            if rect.is_empty() || !rect.contains(cx, cy) {
                continue;
            }
            let uv = [(cx - rect.x) / rect.width, (cy - rect.y) / rect.height];

            let mut sum = [0.0f32; 3];
            for i in 0..3i32 {
                for j in 0..3i32 {
                    let su = uv[0] + (i - 1) as f32 * one_pixel[0];
                    let sv = uv[1] + (j - 1) as f32 * one_pixel[1];
                    let texel = sample_nearest_clamped(image, su, sv);
                    let w = kernel.weight_at(i - 1, j - 1);
                    for (c, acc) in sum.iter_mut().enumerate() {
                        *acc += texel[c] * w;
                    }
                }
            }

            let pi = px * 4;
            row_out[pi] = unorm8(sum[0]);
            row_out[pi + 1] = unorm8(sum[1]);
            row_out[pi + 2] = unorm8(sum[2]);
            row_out[pi + 3] = 255;
        }
    });

    Ok(RenderedFrame { width, height, pixels })
}

/// Nearest texel at (`u`, `v`) with clamp-to-edge addressing, as normalized RGB.
fn sample_nearest_clamped(image: &SourceImage, u: f32, v: f32) -> [f32; 3] {
    let tx = ((u * image.width as f32).floor() as i64).clamp(0, image.width as i64 - 1) as u32;
    let ty = ((v * image.height as f32).floor() as i64).clamp(0, image.height as i64 - 1) as u32;
    let [r, g, b, _] = image.texel(tx, ty);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

/// Float → Rgba8Unorm store conversion.
fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, SurfaceSize};
    use crate::kernel::{Kernel, KernelPreset};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn strip(colors: &[[u8; 4]]) -> SourceImage {
        let pixels = colors.iter().flatten().copied().collect();
        SourceImage::new(colors.len() as u32, 1, pixels).unwrap()
    }

    fn checkerboard(size: u32) -> SourceImage {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        SourceImage::new(size, size, pixels).unwrap()
    }

    #[test]
    fn identity_on_solid_red() {
        let req = RenderRequest::new(SourceImage::solid(2, 2, [255, 0, 0, 128]), Kernel::IDENTITY);
        let frame = convolve_cpu(&req, &Layout::fit(2, 2)).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(frame.pixel(x, y), RED);
            }
        }
    }

    #[test]
    fn identity_reproduces_source() {
        let img = strip(&[RED, GREEN, BLUE]);
        let req = RenderRequest::new(img.clone(), Kernel::IDENTITY);
        let frame = convolve_cpu(&req, &Layout::fit(3, 1)).unwrap();
        assert_eq!(frame.pixels, img.pixels);
    }

    #[test]
    fn left_neighbour_kernel_clamps_at_edge() {
        // Row 1 = no vertical offset, column 0 = one texel to the left.
        let k = Kernel::from_slice(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let req = RenderRequest::new(strip(&[RED, GREEN, BLUE]), k);
        let frame = convolve_cpu(&req, &Layout::fit(3, 1)).unwrap();
        assert_eq!(frame.pixel(0, 0), RED);
        assert_eq!(frame.pixel(1, 0), RED);
        assert_eq!(frame.pixel(2, 0), GREEN);
    }

    #[test]
    fn transposed_kernel_reads_vertical_neighbour() {
        // Same weight in row 0 / column 1: the texel above.  In a 1-row
        // image that clamps back onto the pixel itself.
        let k = Kernel::from_slice(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let img = strip(&[RED, GREEN, BLUE]);
        let req = RenderRequest::new(img.clone(), k);
        let frame = convolve_cpu(&req, &Layout::fit(3, 1)).unwrap();
        assert_eq!(frame.pixels, img.pixels);
    }

    #[test]
    fn box_blur_on_checkerboard_is_mid_gray() {
        let req = RenderRequest::new(checkerboard(8), KernelPreset::BoxBlur.kernel());
        let frame = convolve_cpu(&req, &Layout::fit(8, 8)).unwrap();
        for y in 1..7 {
            for x in 1..7 {
                let [r, g, b, a] = frame.pixel(x, y);
                assert_eq!((r, a), (g, 255));
                assert_eq!(r, b);
                // 4 or 5 of 9 taps are white.
                assert!((113..=142).contains(&r), "({x},{y}) = {r}");
            }
        }
    }

    #[test]
    fn pixels_outside_rect_stay_clear() {
        let layout = Layout {
            rect: Rect::new(1.0, 1.0, 2.0, 2.0),
            surface: SurfaceSize::new(4, 4),
        };
        let req = RenderRequest::new(SourceImage::solid(2, 2, GREEN), Kernel::IDENTITY);
        let frame = convolve_cpu(&req, &layout).unwrap();
        assert_eq!(frame.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(frame.pixel(3, 3), [0, 0, 0, 0]);
        assert_eq!(frame.pixel(1, 1), GREEN);
        assert_eq!(frame.pixel(2, 2), GREEN);
    }

    #[test]
    fn stretched_quad_samples_nearest() {
        // 2 texels stretched over 4 pixels.
        let layout = Layout {
            rect: Rect::new(0.0, 0.0, 4.0, 1.0),
            surface: SurfaceSize::new(4, 1),
        };
        let req = RenderRequest::new(strip(&[RED, BLUE]), Kernel::IDENTITY);
        let frame = convolve_cpu(&req, &layout).unwrap();
        assert_eq!(frame.pixel(0, 0), RED);
        assert_eq!(frame.pixel(1, 0), RED);
        assert_eq!(frame.pixel(2, 0), BLUE);
        assert_eq!(frame.pixel(3, 0), BLUE);
    }

    #[test]
    fn kernel_is_not_normalized() {
        let doubled = Kernel::new([[0.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 0.0]]);
        let req = RenderRequest::new(SourceImage::solid(1, 1, [100, 10, 0, 255]), doubled);
        let frame = convolve_cpu(&req, &Layout::fit(1, 1)).unwrap();
        assert_eq!(frame.pixel(0, 0), [200, 20, 0, 255]);
    }

    #[test]
    fn zero_surface_is_rejected() {
        let req = RenderRequest::new(SourceImage::solid(1, 1, RED), Kernel::IDENTITY);
        let layout = Layout { rect: Rect::new(0.0, 0.0, 1.0, 1.0), surface: SurfaceSize::new(0, 1) };
        assert!(matches!(
            convolve_cpu(&req, &layout),
            Err(RenderError::InvalidSurface { .. })
        ));
    }
}
