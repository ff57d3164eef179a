//! Shared helpers for the render tests.
//!
//! GPU tests open a real device.  On machines without any adapter (headless
//! CI without a software rasterizer) they print a note and return early.

#![allow(dead_code)]

use kernelfe::{ConvolutionRenderer, GpuContext, RenderedFrame, ShaderSource, SourceImage};

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Renderer on whatever adapter is available, or `None` (with a note).
pub fn renderer() -> Option<ConvolutionRenderer> {
    renderer_with(ShaderSource::CONVOLUTION)
}

pub fn renderer_with(shaders: ShaderSource) -> Option<ConvolutionRenderer> {
    match GpuContext::new("high performance") {
        Ok(ctx) => Some(ConvolutionRenderer::with_shaders(ctx, shaders)),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

/// One-row image from a list of colours.
pub fn strip(colors: &[[u8; 4]]) -> SourceImage {
    let pixels = colors.iter().flatten().copied().collect();
    SourceImage::new(colors.len() as u32, 1, pixels).expect("strip dimensions")
}

/// Deterministic, non-symmetric test pattern.
pub fn pattern(width: u32, height: u32) -> SourceImage {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                ((x * 37 + y * 11) % 256) as u8,
                ((x * x + y * 53) % 256) as u8,
                ((x * 5 + y * y * 3) % 256) as u8,
                255,
            ]);
        }
    }
    SourceImage::new(width, height, pixels).expect("pattern dimensions")
}

pub fn checkerboard(size: u32) -> SourceImage {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    SourceImage::new(size, size, pixels).expect("checkerboard dimensions")
}

/// Assert two frames agree within `tolerance` per channel.
pub fn assert_frames_close(gpu: &RenderedFrame, cpu: &RenderedFrame, tolerance: u8, what: &str) {
    let diff = gpu
        .max_channel_diff(cpu)
        .unwrap_or_else(|| panic!("{what}: frame sizes differ"));
    assert!(diff <= tolerance, "{what}: max channel difference {diff} > {tolerance}");
}
