// ============================================================================
// KERNEL — 3×3 convolution matrix, parsing and named presets
// ============================================================================
//
// Values are row-major as the user reads them: row = vertical offset
// (-1 above, +1 below), column = horizontal offset (-1 left, +1 right).
// The renderer never rescales a kernel; `normalized()` is for callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kernel {
    pub rows: [[f32; 3]; 3],
}

impl Kernel {
    pub const IDENTITY: Kernel = Kernel {
        rows: [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
    };

    pub const fn new(rows: [[f32; 3]; 3]) -> Self {
        Self { rows }
    }

    /// Build from nine row-major values.
    pub fn from_slice(values: &[f32]) -> Result<Self, KernelError> {
        if values.len() != 9 {
            return Err(KernelError::WrongCount { found: values.len() });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(KernelError::NonFinite { index });
        }
        let mut rows = [[0.0f32; 3]; 3];
        for (i, v) in values.iter().enumerate() {
            rows[i / 3][i % 3] = *v;
        }
        Ok(Self { rows })
    }

    /// Parse nine textual entries, e.g. the cells of a 3×3 input table.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, KernelError> {
        if entries.len() != 9 {
            return Err(KernelError::WrongCount { found: entries.len() });
        }
        let mut values = [0.0f32; 9];
        for (index, entry) in entries.iter().enumerate() {
            let text = entry.as_ref().trim();
            values[index] = text.parse::<f32>().map_err(|_| KernelError::NotANumber {
                index,
                text: text.to_string(),
            })?;
        }
        Self::from_slice(&values)
    }

    pub fn values(&self) -> [f32; 9] {
        let mut out = [0.0f32; 9];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.rows[i / 3][i % 3];
        }
        out
    }

    pub fn transposed(&self) -> Self {
        let r = &self.rows;
        Self {
            rows: [
                [r[0][0], r[1][0], r[2][0]],
                [r[0][1], r[1][1], r[2][1]],
                [r[0][2], r[1][2], r[2][2]],
            ],
        }
    }

    /// Sum of all entries.
    pub fn weight(&self) -> f32 {
        self.rows.iter().flatten().sum()
    }

    /// Scale so the entries sum to 1.  Kernels that sum to zero (edge
    /// detectors) are returned unchanged.
    pub fn normalized(&self) -> Self {
        let w = self.weight();
        if w == 0.0 {
            return *self;
        }
        let mut rows = self.rows;
        for v in rows.iter_mut().flatten() {
            *v /= w;
        }
        Self { rows }
    }

    /// Weight applied to the sample at (`dx`, `dy`).
    ///
    /// Both offsets must lie in -1..=1; anything else panics.
    pub(crate) fn weight_at(&self, dx: i32, dy: i32) -> f32 {
        debug_assert!(
            (-1..=1).contains(&dx) && (-1..=1).contains(&dy),
            "kernel offset ({dx}, {dy}) outside the 3x3 window"
        );
        self.rows[(dy + 1) as usize][(dx + 1) as usize]
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Nine numbers separated by commas and/or whitespace.
impl FromStr for Kernel {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries: Vec<&str> = s
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        Self::from_entries(&entries)
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, " / ")?;
            }
            write!(f, "{} {} {}", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

// ============================================================================
// PRESETS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KernelPreset {
    Identity,
    BoxBlur,
    GaussianBlur,
    GaussianBlur2,
    TriangleBlur,
    Sharpen,
    Sharpness,
    Unsharpen,
    EdgeDetect,
    EdgeDetect2,
    SobelHorizontal,
    SobelVertical,
    PrewittHorizontal,
    PrewittVertical,
    Emboss,
}

impl KernelPreset {
    pub const ALL: [KernelPreset; 15] = [
        KernelPreset::Identity,
        KernelPreset::BoxBlur,
        KernelPreset::GaussianBlur,
        KernelPreset::GaussianBlur2,
        KernelPreset::TriangleBlur,
        KernelPreset::Sharpen,
        KernelPreset::Sharpness,
        KernelPreset::Unsharpen,
        KernelPreset::EdgeDetect,
        KernelPreset::EdgeDetect2,
        KernelPreset::SobelHorizontal,
        KernelPreset::SobelVertical,
        KernelPreset::PrewittHorizontal,
        KernelPreset::PrewittVertical,
        KernelPreset::Emboss,
    ];

    pub fn kernel(self) -> Kernel {
        let b = 1.0 / 9.0;
        let rows = match self {
            KernelPreset::Identity => return Kernel::IDENTITY,
            KernelPreset::BoxBlur => [[b, b, b], [b, b, b], [b, b, b]],
            KernelPreset::GaussianBlur => [
                [0.045, 0.122, 0.045],
                [0.122, 0.332, 0.122],
                [0.045, 0.122, 0.045],
            ],
            // Unnormalized; pair with `--normalize`.
            KernelPreset::GaussianBlur2 => [[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]],
            KernelPreset::TriangleBlur => [
                [0.0625, 0.125, 0.0625],
                [0.125, 0.25, 0.125],
                [0.0625, 0.125, 0.0625],
            ],
            KernelPreset::Sharpen => [[-1.0, -1.0, -1.0], [-1.0, 16.0, -1.0], [-1.0, -1.0, -1.0]],
            KernelPreset::Sharpness => [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]],
            KernelPreset::Unsharpen => [[-1.0, -1.0, -1.0], [-1.0, 9.0, -1.0], [-1.0, -1.0, -1.0]],
            KernelPreset::EdgeDetect => [
                [-0.125, -0.125, -0.125],
                [-0.125, 1.0, -0.125],
                [-0.125, -0.125, -0.125],
            ],
            KernelPreset::EdgeDetect2 => [[-1.0, -1.0, -1.0], [-1.0, 8.0, -1.0], [-1.0, -1.0, -1.0]],
            KernelPreset::SobelHorizontal => [[1.0, 2.0, 1.0], [0.0, 0.0, 0.0], [-1.0, -2.0, -1.0]],
            KernelPreset::SobelVertical => [[1.0, 0.0, -1.0], [2.0, 0.0, -2.0], [1.0, 0.0, -1.0]],
            KernelPreset::PrewittHorizontal => [[1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [-1.0, -1.0, -1.0]],
            KernelPreset::PrewittVertical => [[1.0, 0.0, -1.0], [1.0, 0.0, -1.0], [1.0, 0.0, -1.0]],
            KernelPreset::Emboss => [[-2.0, -1.0, 0.0], [-1.0, 1.0, 1.0], [0.0, 1.0, 2.0]],
        };
        Kernel::new(rows)
    }
}
