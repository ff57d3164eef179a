//! Render settings with TOML file support.
//!
//! Every section uses `#[serde(default)]`, so a file that only sets
//! `[kernel] preset = "box-blur"` is valid.  Command-line flags are applied on
//! top of whatever the file provides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::{Layout, Rect, SurfaceSize};
use crate::kernel::{Kernel, KernelPreset};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub kernel: KernelConfig,
    pub layout: LayoutConfig,
    pub gpu: GpuConfig,
}

/// Which kernel to apply.  `values` (nine numbers, row-major) and `preset`
/// are mutually exclusive; with neither set the identity kernel is used.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub values: Option<Vec<f32>>,
    pub preset: Option<KernelPreset>,
    /// Divide by the kernel weight before upload.
    pub normalize: bool,
}

/// Where the image lands on the output surface.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub rect: Option<Rect>,
    pub surface: Option<SurfaceSize>,
    /// Use the fixed 600×600 rect at (200, 50) on an 800×650 surface.
    pub demo: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// "high performance", "low power" / "integrated", or "none".
    pub preference: String,
    /// Render on the CPU when no adapter can be opened.
    pub allow_cpu_fallback: bool,
    /// Skip the GPU entirely.
    pub force_cpu: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            preference: "high performance".into(),
            allow_cpu_fallback: true,
            force_cpu: false,
        }
    }
}

impl RenderConfig {
    /// Load settings from a TOML file.  Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RenderConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty-printed TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Value {
            field: "config",
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject combinations that cannot describe a single render.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.kernel.resolve()?;
        self.layout.validate()
    }
}

impl KernelConfig {
    pub fn resolve(&self) -> Result<Kernel, ConfigError> {
        let kernel = match (&self.values, self.preset) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Value {
                    field: "kernel",
                    message: "set either `values` or `preset`, not both".into(),
                });
            }
            (Some(values), None) => Kernel::from_slice(values)?,
            (None, Some(preset)) => preset.kernel(),
            (None, None) => Kernel::IDENTITY,
        };
        Ok(if self.normalize { kernel.normalized() } else { kernel })
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rect) = self.rect {
            let finite = [rect.x, rect.y, rect.width, rect.height]
                .iter()
                .all(|v| v.is_finite());
            if !finite || rect.is_empty() {
                return Err(ConfigError::Value {
                    field: "layout.rect",
                    message: format!("{rect:?} has no drawable area"),
                });
            }
        }
        if let Some(surface) = self.surface
            && (surface.width == 0 || surface.height == 0)
        {
            return Err(ConfigError::Value {
                field: "layout.surface",
                message: format!("{}x{} is empty", surface.width, surface.height),
            });
        }
        Ok(())
    }

    /// Placement for an image of the given size.
    ///
    /// The rect defaults to the whole image at the origin and the surface to
    /// the smallest size that contains the rect.
    pub fn resolve(&self, image_width: u32, image_height: u32) -> Layout {
        if self.demo && self.rect.is_none() && self.surface.is_none() {
            return Layout::demo();
        }
        let rect = self.rect.unwrap_or_else(|| {
            if self.demo {
                Rect::DEMO
            } else {
                Rect::new(0.0, 0.0, image_width as f32, image_height as f32)
            }
        });
        let surface = self.surface.unwrap_or_else(|| {
            if self.demo {
                SurfaceSize::DEMO
            } else {
                SurfaceSize::enclosing(&rect)
            }
        });
        Layout { rect, surface }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: RenderConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, RenderConfig::default());
        assert_eq!(cfg.kernel.resolve().unwrap(), Kernel::IDENTITY);
        assert!(cfg.gpu.allow_cpu_fallback);
    }

    #[test]
    fn default_round_trips_through_toml() {
        let mut cfg = RenderConfig::default();
        cfg.kernel.preset = Some(KernelPreset::Emboss);
        cfg.layout.rect = Some(Rect::new(1.0, 2.0, 30.0, 40.0));
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RenderConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn partial_sections_parse() {
        let cfg: RenderConfig = toml::from_str(
            r#"
            [kernel]
            preset = "box-blur"
            normalize = true

            [layout]
            rect = { x = 10, y = 0, width = 20, height = 20 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.kernel.preset, Some(KernelPreset::BoxBlur));
        assert_eq!(cfg.layout.rect, Some(Rect::new(10.0, 0.0, 20.0, 20.0)));
        assert_eq!(cfg.gpu, GpuConfig::default());
    }

    #[test]
    fn values_build_a_kernel() {
        let cfg: RenderConfig = toml::from_str(
            "[kernel]\nvalues = [0, 0, 0, 1, 0, 0, 0, 0, 0]\n",
        )
        .unwrap();
        assert_eq!(cfg.kernel.resolve().unwrap().weight_at(-1, 0), 1.0);
    }

    #[test]
    fn wrong_value_count_is_a_kernel_error() {
        let cfg = KernelConfig { values: Some(vec![1.0; 8]), ..Default::default() };
        assert!(matches!(
            cfg.resolve(),
            Err(ConfigError::Kernel(KernelError::WrongCount { found: 8 }))
        ));
    }

    #[test]
    fn values_and_preset_conflict() {
        let cfg = KernelConfig {
            values: Some(vec![0.0; 9]),
            preset: Some(KernelPreset::Sharpen),
            normalize: false,
        };
        assert!(matches!(cfg.resolve(), Err(ConfigError::Value { field: "kernel", .. })));
    }

    #[test]
    fn normalize_divides_by_weight() {
        let cfg = KernelConfig {
            preset: Some(KernelPreset::GaussianBlur2),
            normalize: true,
            ..Default::default()
        };
        let k = cfg.resolve().unwrap();
        assert!((k.weight() - 1.0).abs() < 1e-6);
        assert!((k.rows[1][1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn layout_defaults_fit_the_image() {
        let layout = LayoutConfig::default().resolve(320, 200);
        assert_eq!(layout, Layout::fit(320, 200));
    }

    #[test]
    fn layout_surface_encloses_custom_rect() {
        let cfg = LayoutConfig { rect: Some(Rect::new(5.0, 5.0, 10.5, 4.0)), ..Default::default() };
        let layout = cfg.resolve(1, 1);
        assert_eq!(layout.surface, SurfaceSize::new(16, 9));
    }

    #[test]
    fn demo_layout() {
        let cfg = LayoutConfig { demo: true, ..Default::default() };
        assert_eq!(cfg.resolve(64, 64), Layout::demo());
        let sized = LayoutConfig {
            demo: true,
            surface: Some(SurfaceSize::new(1024, 768)),
            ..Default::default()
        };
        assert_eq!(sized.resolve(64, 64).rect, Rect::DEMO);
    }

    #[test]
    fn empty_rect_is_rejected() {
        let cfg = LayoutConfig { rect: Some(Rect::new(0.0, 0.0, 0.0, 5.0)), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[kernel]\nvalues = \"nope\"\n").unwrap();
        match RenderConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernelfe.toml");
        let mut cfg = RenderConfig::default();
        cfg.gpu.force_cpu = true;
        cfg.save(&path).unwrap();
        assert_eq!(RenderConfig::load(&path).unwrap(), cfg);
    }
}
