// ============================================================================
// KernelFE CLI — batch convolution via command-line arguments
// ============================================================================
//
// Usage examples:
//   kernelfe -i photo.png --preset box-blur -o blurred.png
//   kernelfe -i photo.jpg --kernel "0,-1,0,-1,5,-1,0,-1,0" -o sharp.jpg -q 85
//   kernelfe -i "shots/*.png" --preset emboss --output-dir out/
//   kernelfe -i photo.png --preset sobel-horizontal --demo-layout
//   kernelfe -i a.png b.png --config kernel.toml --cpu
//
// Images are decoded in parallel (rayon).  Renders run in input order against
// a single GPU surface; each frame is read back and written before the next
// render starts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::config::RenderConfig;
use crate::error::{AppError, ConfigError, RenderError};
use crate::geometry::{Rect, SurfaceSize};
use crate::gpu::{ConvolutionRenderer, GpuContext};
use crate::io::{SaveFormat, is_supported_input, load_images, write_frame};
use crate::kernel::{Kernel, KernelPreset};
use crate::ops::convolve::{apply_kernel, convolve_cpu};
use crate::request::{RenderRequest, SourceImage};

const DEFAULT_QUALITY: u8 = 90;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// KernelFE — apply a 3×3 convolution kernel to images on the GPU.
#[derive(Parser, Debug)]
#[command(
    name = "kernelfe",
    version,
    about = "Apply a 3x3 convolution kernel to images with a GPU shader pipeline",
    long_about = "Convolve image files with a 3x3 kernel using a wgpu vertex + fragment\n\
                  shader pair, falling back to an equivalent CPU path when no GPU is\n\
                  available. Reads PNG, JPEG, WEBP, BMP, TGA, TIFF and GIF (first frame);\n\
                  writes PNG, JPEG, BMP, TGA or TIFF.\n\n\
                  Example:\n  \
                  kernelfe -i photo.png --preset gaussian-blur -o soft.png\n  \
                  kernelfe -i *.jpg --kernel \"-1,-1,-1,-1,8,-1,-1,-1,-1\" --output-dir edges/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tga, tiff.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90). Ignored for lossless formats.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Nine kernel values, row-major, separated by commas or spaces.
    #[arg(short, long, value_name = "VALUES", allow_hyphen_values = true, conflicts_with = "preset")]
    pub kernel: Option<Kernel>,

    /// Named kernel.
    #[arg(short, long, value_enum, value_name = "NAME")]
    pub preset: Option<KernelPreset>,

    /// Divide the kernel by its weight (sum) when the weight is non-zero.
    #[arg(long)]
    pub normalize: bool,

    /// Target rectangle on the surface: x,y,width,height (pixels).
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub rect: Option<Rect>,

    /// Output surface size: WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_surface)]
    pub surface: Option<SurfaceSize>,

    /// Draw into a 600×600 rect at (200, 50) on an 800×650 surface.
    #[arg(long)]
    pub demo_layout: bool,

    /// TOML settings file; flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// GPU preference: "high performance", "low power", "none".
    #[arg(long, value_name = "PREF")]
    pub gpu: Option<String>,

    /// Skip the GPU and convolve on the CPU.
    #[arg(long)]
    pub cpu: bool,

    /// Mirror all log output to stderr and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        log::error!("no input files matched the given pattern(s)");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        log::error!(
            "{} input files given but --output only accepts a single file path; \
             use --output-dir for batch processing",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let kernel = match config.kernel.resolve() {
        Ok(k) => k,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!("kernel: {}", kernel);

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());
    let quality = output_quality(save_format, args.quality);

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        log::error!("could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let mut renderer = match open_renderer(&config) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Decode everything up front, in parallel.  Order is preserved.
    let decode_start = Instant::now();
    let decoded = load_images(&inputs);
    log::debug!(
        "decoded {} file(s) in {:.0}ms",
        decoded.len(),
        decode_start.elapsed().as_secs_f64() * 1000.0
    );

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, (input_path, image)) in inputs.iter().zip(decoded).enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            log::error!("cannot determine output path for '{}'", input_path.display());
            any_failure = true;
            continue;
        };

        let result = image.and_then(|img| {
            run_one(
                img,
                kernel,
                &config,
                renderer.as_mut(),
                &output_path,
                save_format,
                quality,
            )
        });

        match result {
            Ok(()) => {
                log::info!("{} -> {}", input_path.display(), output_path.display());
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log::error!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    image: SourceImage,
    kernel: Kernel,
    config: &RenderConfig,
    renderer: Option<&mut ConvolutionRenderer>,
    output: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), AppError> {
    let layout = config.layout.resolve(image.width, image.height);
    let request = RenderRequest::new(image, kernel);

    let frame = match apply_kernel(&request, &layout, renderer) {
        Err(e) if e.exceeds_device_limits() && config.gpu.allow_cpu_fallback => {
            log::warn!("{e}; convolving on the CPU");
            convolve_cpu(&request, &layout)?
        }
        other => other?,
    };

    write_frame(frame, output, format, quality)
}

/// Open the GPU unless the config says not to.  `Ok(None)` means CPU path.
fn open_renderer(config: &RenderConfig) -> Result<Option<ConvolutionRenderer>, RenderError> {
    if config.gpu.force_cpu {
        log::info!("GPU disabled, using CPU convolution");
        return Ok(None);
    }
    match GpuContext::new(&config.gpu.preference) {
        Ok(ctx) => {
            let renderer = ConvolutionRenderer::new(ctx);
            log::info!("rendering on {}", renderer.adapter_name());
            Ok(Some(renderer))
        }
        Err(e) if config.gpu.allow_cpu_fallback => {
            log::warn!("GPU unavailable ({}), using CPU convolution", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Settings file (if any) with command-line overrides applied.
fn build_config(args: &CliArgs) -> Result<RenderConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };

    if let Some(kernel) = args.kernel {
        config.kernel.values = Some(kernel.values().to_vec());
        config.kernel.preset = None;
    }
    if let Some(preset) = args.preset {
        config.kernel.preset = Some(preset);
        config.kernel.values = None;
    }
    config.kernel.normalize |= args.normalize;

    if args.rect.is_some() {
        config.layout.rect = args.rect;
    }
    if args.surface.is_some() {
        config.layout.surface = args.surface;
    }
    config.layout.demo |= args.demo_layout;

    if let Some(pref) = &args.gpu {
        config.gpu.preference = pref.clone();
    }
    config.gpu.force_cpu |= args.cpu;

    config.validate()?;
    Ok(config)
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    matched = true;
                    if !is_supported_input(&entry) {
                        log::debug!("skipping '{}': not an image extension", entry.display());
                        continue;
                    }
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                }
                if !matched {
                    log::warn!("pattern '{}' matched no files", pattern);
                }
            }
            Err(e) => {
                log::warn!("invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f).unwrap_or_else(|| {
            log::warn!("unknown format '{}', writing png", f);
            SaveFormat::Png
        });
    }
    output.and_then(SaveFormat::from_path).unwrap_or_default()
}

/// Encoder quality for `format`.  A `-q` given for a format without a quality
/// setting is reported and otherwise ignored.
fn output_quality(format: SaveFormat, requested: Option<u8>) -> u8 {
    match requested {
        Some(q) if format.supports_quality() => q,
        Some(q) => {
            log::warn!("--quality {} has no effect on {} output", q, format.extension());
            DEFAULT_QUALITY
        }
        None => DEFAULT_QUALITY,
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|_| format!("'{}' is not a number", p.trim())))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[x, y, w, h] if w > 0.0 && h > 0.0 => Ok(Rect::new(x, y, w, h)),
        &[_, _, _, _] => Err("width and height must be positive".into()),
        _ => Err(format!("expected x,y,width,height, got {} value(s)", parts.len())),
    }
}

fn parse_surface(s: &str) -> Result<SurfaceSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be non-zero".into());
    }
    Ok(SurfaceSize::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{encode_and_write, load_image};

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("kernelfe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn negative_kernel_values_parse() {
        let args = parse(&["-i", "a.png", "--kernel", "-1,-1,-1,-1,8,-1,-1,-1,-1"]);
        let k = args.kernel.unwrap();
        assert_eq!(k.rows[1][1], 8.0);
        assert_eq!(k.weight(), 0.0);
    }

    #[test]
    fn malformed_kernel_is_rejected_by_clap() {
        let res = CliArgs::try_parse_from(["kernelfe", "-i", "a.png", "--kernel", "1,2,3"]);
        assert!(res.is_err());
    }

    #[test]
    fn kernel_and_preset_conflict() {
        let res = CliArgs::try_parse_from([
            "kernelfe", "-i", "a.png", "--kernel", "0,0,0,0,1,0,0,0,0", "--preset", "emboss",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn rect_and_surface_values() {
        assert_eq!(parse_rect("200, 50, 600, 600").unwrap(), Rect::DEMO);
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("0,0,0,5").is_err());
        assert!(parse_rect("a,0,1,1").is_err());
        assert_eq!(parse_surface("800x650").unwrap(), SurfaceSize::DEMO);
        assert!(parse_surface("800").is_err());
        assert!(parse_surface("0x10").is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("k.toml");
        std::fs::write(
            &cfg_path,
            "[kernel]\npreset = \"emboss\"\n[gpu]\npreference = \"low power\"\n",
        )
        .unwrap();
        let args = parse(&[
            "-i", "a.png", "--config", cfg_path.to_str().unwrap(),
            "--preset", "box-blur", "--cpu", "--surface", "10x10",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.kernel.preset, Some(KernelPreset::BoxBlur));
        assert_eq!(cfg.gpu.preference, "low power");
        assert!(cfg.gpu.force_cpu);
        assert_eq!(cfg.layout.surface, Some(SurfaceSize::new(10, 10)));
    }

    #[test]
    fn kernel_flag_replaces_config_preset() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("k.toml");
        std::fs::write(&cfg_path, "[kernel]\npreset = \"sharpen\"\n").unwrap();
        let args = parse(&[
            "-i", "a.png", "--config", cfg_path.to_str().unwrap(), "--kernel", "1 1 1 1 1 1 1 1 1",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.kernel.preset, None);
        assert_eq!(cfg.kernel.resolve().unwrap().weight(), 9.0);
    }

    #[test]
    fn format_selection() {
        assert_eq!(parse_format(Some("JPG"), None), SaveFormat::Jpeg);
        assert_eq!(parse_format(Some("nope"), None), SaveFormat::Png);
        assert_eq!(parse_format(None, Some(Path::new("x.tif"))), SaveFormat::Tiff);
        assert_eq!(parse_format(None, Some(Path::new("x"))), SaveFormat::Png);
        assert_eq!(parse_format(None, None), SaveFormat::Png);
    }

    #[test]
    fn output_path_rules() {
        let input = Path::new("shots/cat.png");
        assert_eq!(
            build_output_path(input, Some(Path::new("o.bmp")), None, SaveFormat::Png),
            Some(PathBuf::from("o.bmp"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Jpeg),
            Some(PathBuf::from("out/cat.jpg"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Tga),
            Some(PathBuf::from("shots/cat.tga"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(PathBuf::from("shots/cat_out.png"))
        );
    }

    #[test]
    fn inputs_expand_globs_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let literal = dir.path().join("a.png").to_string_lossy().into_owned();
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let missing = dir.path().join("*.jpg").to_string_lossy().into_owned();
        let found = resolve_inputs(&[literal, pattern, missing]);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.png"));
        assert!(found[1].ends_with("b.png"));
    }

    #[test]
    fn wildcard_skips_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.JPG", "notes.txt", "README"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let everything = dir.path().join("*").to_string_lossy().into_owned();
        let mut found = resolve_inputs(&[everything]);
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.png"));
        assert!(found[1].ends_with("b.JPG"));

        // A file named directly is passed through; decoding decides.
        let literal = dir.path().join("notes.txt").to_string_lossy().into_owned();
        assert_eq!(resolve_inputs(&[literal]).len(), 1);
    }

    #[test]
    fn quality_only_applies_to_jpeg() {
        assert_eq!(parse(&["-i", "a.png"]).quality, None);
        assert_eq!(output_quality(SaveFormat::Jpeg, Some(40)), 40);
        assert_eq!(output_quality(SaveFormat::Jpeg, None), DEFAULT_QUALITY);
        assert_eq!(output_quality(SaveFormat::Png, Some(40)), DEFAULT_QUALITY);
        assert_eq!(output_quality(SaveFormat::Tiff, None), DEFAULT_QUALITY);
    }

    #[test]
    fn cpu_run_writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let red = image::RgbaImage::from_pixel(4, 3, image::Rgba([255, 0, 0, 255]));
        for name in ["one.png", "two.png"] {
            encode_and_write(&red, &dir.path().join(name), SaveFormat::Png, 90).unwrap();
        }
        let out_dir = dir.path().join("out");
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let args = parse(&[
            "-i", pattern.as_str(), "--output-dir", out_dir.to_str().unwrap(), "--preset", "box-blur", "--cpu",
        ]);
        assert_eq!(run(args), ExitCode::SUCCESS);

        for name in ["one.png", "two.png"] {
            let out = load_image(&out_dir.join(name)).unwrap();
            assert_eq!((out.width, out.height), (4, 3));
            // Box blur of a solid image is the image.
            assert!(out.pixels.chunks_exact(4).all(|p| p[0] >= 254 && p[1] == 0 && p[3] == 255));
        }
    }

    #[test]
    fn unreadable_input_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.png");
        std::fs::write(&bogus, b"not a png").unwrap();
        let args = parse(&["-i", bogus.to_str().unwrap(), "--cpu"]);
        assert_eq!(run(args), ExitCode::FAILURE);
    }
}
