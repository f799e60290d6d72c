// ============================================================================
// IMAGE I/O — decoding sources, encoding exports, export naming
// ============================================================================

use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::EditorError;

/// Extensions offered by the open dialog.
pub const OPEN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Output encodings, picked from the target file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Gif,
}

impl SaveFormat {
    pub fn all() -> &'static [SaveFormat] {
        &[SaveFormat::Png, SaveFormat::Jpeg, SaveFormat::Bmp, SaveFormat::Gif]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Gif => "gif",
        }
    }

    /// Every extension that selects this format, for dialog filters.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SaveFormat::Png => &["png"],
            SaveFormat::Jpeg => &["jpg", "jpeg"],
            SaveFormat::Bmp => &["bmp"],
            SaveFormat::Gif => &["gif"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaveFormat::Png => "PNG",
            SaveFormat::Jpeg => "JPEG",
            SaveFormat::Bmp => "BMP",
            SaveFormat::Gif => "GIF",
        }
    }

    pub fn from_extension(ext: &str) -> Option<SaveFormat> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "gif" => Some(SaveFormat::Gif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<SaveFormat> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::from_extension)
    }
}

/// Decode any image the `image` crate was built with support for.
pub fn load_image(path: &Path) -> Result<DynamicImage, EditorError> {
    let img = image::open(path).map_err(|e| EditorError::load(path, e))?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(EditorError::load(path, "image has no pixels"));
    }
    Ok(img)
}

/// Encode `image` with the format implied by the path's extension and write it.
/// `quality` only affects JPEG.
pub fn save_image(image: &RgbImage, path: &Path, quality: u8) -> Result<(), EditorError> {
    let format = SaveFormat::from_path(path).ok_or_else(|| {
        EditorError::save(path, "unsupported file extension (use png, jpg, bmp or gif)")
    })?;
    encode_and_write(image, path, format, quality)
}

/// Encode and write an image to a file.
/// This is a standalone function (no `&mut self`) so it can be called from
/// background threads via `rayon::spawn`.
pub fn encode_and_write(
    image: &RgbImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), EditorError> {
    let file = File::create(path).map_err(|e| EditorError::save(path, e))?;
    let mut writer = BufWriter::new(file);
    let (w, h) = image.dimensions();

    let encoded = match format {
        SaveFormat::Png => PngEncoder::new(&mut writer).write_image(image.as_raw(), w, h, ColorType::Rgb8),
        SaveFormat::Jpeg => JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode(
            image.as_raw(),
            w,
            h,
            ColorType::Rgb8,
        ),
        SaveFormat::Bmp => BmpEncoder::new(&mut writer).encode(image.as_raw(), w, h, ColorType::Rgb8),
        SaveFormat::Gif => GifEncoder::new(&mut writer).encode(image.as_raw(), w, h, ColorType::Rgb8),
    };
    encoded.map_err(|e| EditorError::save(path, e))?;
    writer.flush().map_err(|e| EditorError::save(path, e))?;
    Ok(())
}

/// Default export name: `<stem>_pixelated.<ext>` with spaces replaced by
/// underscores. Sources without an extension export as PNG.
pub fn export_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(SaveFormat::Png.extension());
    format!("{}_pixelated.{}", stem, ext).replace(' ', "_")
}
