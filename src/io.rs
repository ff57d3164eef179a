use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::codecs::tiff::TiffEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{AppError, RenderError};
use crate::request::{RenderedFrame, SourceImage};

/// Extensions accepted as input (decoded by the `image` crate).
pub const INPUT_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "tga", "tif", "tiff", "webp", "gif",
];

// ============================================================================
// SAVE FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Tiff => "tiff",
        }
    }

    pub fn supports_quality(&self) -> bool {
        matches!(self, SaveFormat::Jpeg)
    }

    /// Format named by a file extension or `--format` value (case-insensitive).
    pub fn from_name(name: &str) -> Option<SaveFormat> {
        match name.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    /// Format implied by `path`'s extension.
    pub fn from_path(path: &Path) -> Option<SaveFormat> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::from_name)
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode an image file into RGBA8.  Animated formats yield their first frame.
pub fn load_image(path: &Path) -> Result<SourceImage, AppError> {
    let img = image::open(path)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(RenderError::EmptyImage.into());
    }
    Ok(SourceImage::from_rgba_image(img))
}

/// Decode a batch in parallel.  Results keep the order of `paths`.
pub fn load_images(paths: &[PathBuf]) -> Vec<Result<SourceImage, AppError>> {
    paths.par_iter().map(|p| load_image(p)).collect()
}

pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| INPUT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode and write an image to a file.
/// Standalone so it can run on any thread.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tga => {
            let encoder = TgaEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tiff => {
            let encoder = TiffEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }

    Ok(())
}

/// Write a read-back frame to disk.
pub fn write_frame(
    frame: RenderedFrame,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), AppError> {
    let expected = frame.width as usize * frame.height as usize * 4;
    let actual = frame.pixels.len();
    let image = frame
        .into_rgba_image()
        .ok_or(RenderError::PixelBufferSize { expected, actual })?;
    encode_and_write(&image, path, format, quality)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| image::Rgba([(x * 40) as u8, (y * 40) as u8, 90, 255]))
    }

    #[test]
    fn format_names_and_extensions() {
        assert_eq!(SaveFormat::from_name("JPEG"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_name("tif"), Some(SaveFormat::Tiff));
        assert_eq!(SaveFormat::from_name("webp"), None);
        assert_eq!(SaveFormat::from_path(Path::new("a/b.Png")), Some(SaveFormat::Png));
        assert_eq!(SaveFormat::from_path(Path::new("noext")), None);
        for f in [SaveFormat::Png, SaveFormat::Jpeg, SaveFormat::Bmp, SaveFormat::Tga, SaveFormat::Tiff] {
            assert_eq!(SaveFormat::from_name(f.extension()), Some(f));
        }
    }

    #[test]
    fn input_extension_filter() {
        assert!(is_supported_input(Path::new("photo.JPG")));
        assert!(is_supported_input(Path::new("anim.gif")));
        assert!(!is_supported_input(Path::new("notes.txt")));
        assert!(!is_supported_input(Path::new("README")));
    }

    #[test]
    fn lossless_formats_survive_disk() {
        let dir = tempfile::tempdir().unwrap();
        let img = gradient(5, 4);
        for format in [SaveFormat::Png, SaveFormat::Bmp, SaveFormat::Tga, SaveFormat::Tiff] {
            let path = dir.path().join(format!("out.{}", format.extension()));
            encode_and_write(&img, &path, format, 90).unwrap();
            let back = load_image(&path).unwrap();
            assert_eq!((back.width, back.height), (5, 4), "{format:?}");
            if matches!(format, SaveFormat::Png | SaveFormat::Tiff) {
                assert_eq!(back.pixels, img.as_raw().clone(), "{format:?}");
            }
        }
    }

    #[test]
    fn jpeg_drops_alpha_but_keeps_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        encode_and_write(&gradient(8, 8), &path, SaveFormat::Jpeg, 85).unwrap();
        let back = load_image(&path).unwrap();
        assert_eq!((back.width, back.height), (8, 8));
        assert!(back.pixels.chunks_exact(4).all(|p| p[3] == 255));
    }

    #[test]
    fn batch_load_keeps_order_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("missing.png");
        let c = dir.path().join("c.png");
        encode_and_write(&gradient(2, 2), &a, SaveFormat::Png, 90).unwrap();
        encode_and_write(&gradient(3, 1), &c, SaveFormat::Png, 90).unwrap();

        let results = load_images(&[a, b, c]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().width, 2);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().width, 3);
    }

    #[test]
    fn frame_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let frame = RenderedFrame { width: 1, height: 1, pixels: vec![1, 2, 3, 4] };
        write_frame(frame, &path, SaveFormat::Png, 90).unwrap();
        assert_eq!(load_image(&path).unwrap().pixels, vec![1, 2, 3, 4]);

        let short = RenderedFrame { width: 2, height: 2, pixels: vec![0; 3] };
        assert!(write_frame(short, &path, SaveFormat::Png, 90).is_err());
    }
}
