// ============================================================================
// RENDER REQUEST — the unit of work handed to a renderer
// ============================================================================

use image::RgbaImage;

use crate::error::RenderError;
use crate::kernel::Kernel;

/// Decoded image: tightly packed RGBA8 rows, row 0 at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyImage);
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::PixelBufferSize { expected, actual: pixels.len() });
        }
        Ok(Self { width, height, pixels })
    }

    /// Single-colour image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, pixels }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, pixels: img.into_raw() }
    }

    /// RGBA of texel (`x`, `y`).  Caller keeps coordinates in range.
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }
}

/// Image + kernel, created per user action and consumed by one render.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub image: SourceImage,
    pub kernel: Kernel,
}

impl RenderRequest {
    pub fn new(image: SourceImage, kernel: Kernel) -> Self {
        Self { image, kernel }
    }
}

/// Read-back contents of the output surface.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderedFrame {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn into_rgba_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
    }

    /// Largest per-channel difference against another frame of the same size.
    pub fn max_channel_diff(&self, other: &RenderedFrame) -> Option<u8> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        Some(
            self.pixels
                .iter()
                .zip(&other.pixels)
                .map(|(a, b)| a.abs_diff(*b))
                .max()
                .unwrap_or(0),
        )
    }
}
