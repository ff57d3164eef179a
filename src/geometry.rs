// ============================================================================
// GEOMETRY — quad placement in pixel space
// ============================================================================

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel space (origin top-left, y down).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Placement used by the original browser demo.
    pub const DEMO: Rect = Rect { x: 200.0, y: 50.0, width: 600.0, height: 600.0 };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Half-open containment, the same rule the rasterizer applies to pixel centers.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Output surface dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    /// Surface that shows all of [`Rect::DEMO`].
    pub const DEMO: SurfaceSize = SurfaceSize { width: 800, height: 650 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Smallest surface containing `rect` (never smaller than 1×1).
    pub fn enclosing(rect: &Rect) -> Self {
        Self {
            width: rect.right().ceil().max(1.0) as u32,
            height: rect.bottom().ceil().max(1.0) as u32,
        }
    }

    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// Resolved placement for a single render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    pub rect: Rect,
    pub surface: SurfaceSize,
}

impl Layout {
    pub fn demo() -> Self {
        Self { rect: Rect::DEMO, surface: SurfaceSize::DEMO }
    }

    /// Rect covering the whole image on a surface of the same size.
    pub fn fit(image_width: u32, image_height: u32) -> Self {
        Self {
            rect: Rect::new(0.0, 0.0, image_width as f32, image_height as f32),
            surface: SurfaceSize::new(image_width, image_height),
        }
    }
}

/// Two triangles covering `rect`:
/// (top-left, top-right, bottom-left), (bottom-left, top-right, bottom-right).
pub fn quad_vertices(rect: &Rect) -> [[f32; 2]; 6] {
    let x1 = rect.x;
    let y1 = rect.y;
    let x2 = rect.right();
    let y2 = rect.bottom();
    [
        [x1, y1],
        [x2, y1],
        [x1, y2],
        [x1, y2],
        [x2, y1],
        [x2, y2],
    ]
}

/// UVs for [`quad_vertices`], index-for-index.
pub fn quad_tex_coords() -> [[f32; 2]; 6] {
    [
        [0.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
        [0.0, 1.0],
        [1.0, 0.0],
        [1.0, 1.0],
    ]
}
