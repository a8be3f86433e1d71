use crate::error::{AppError, AppResult};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

const EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
    ("image/bmp", ".bmp"),
    ("image/tiff", ".tiff"),
    ("image/avif", ".avif"),
];

pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Lowercase essence of a content type (parameters dropped), with `image/jpg` read as `image/jpeg`.
pub fn normalize_mime(raw: &str) -> Option<String> {
    let parsed: mime_guess::Mime = raw.trim().parse().ok()?;
    let essence = parsed.essence_str().to_ascii_lowercase();
    Some(match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    })
}

/// MIME of an uploaded part: its declared content type, else a guess from the filename.
pub fn part_mime(content_type: Option<&str>, file_name: Option<&str>) -> Option<String> {
    content_type
        .filter(|ct| !ct.trim().is_empty())
        .and_then(normalize_mime)
        .or_else(|| {
            file_name
                .and_then(|name| mime_guess::from_path(name).first())
                .and_then(|mime| normalize_mime(mime.essence_str()))
        })
}

/// File extension (with leading dot) for a stored upload.
pub fn extension_for(mime: &str, original_name: Option<&str>) -> String {
    let essence = normalize_mime(mime).unwrap_or_default();
    if let Some((_, ext)) = EXTENSIONS.iter().find(|(m, _)| *m == essence) {
        return ext.to_string();
    }
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| ".bin".to_string())
}

/// Width and height, if the bytes are in a raster format we can read.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Resize an encoded image and re-encode it in the format named by `mime`.
///
/// A single dimension scales the other to keep the aspect ratio. Both dimensions cover the
/// requested box and crop the overflow from the centre. With neither, the input is returned.
/// Any output side larger than `max_dimension` is rejected before pixels are allocated.
pub fn resize(
    bytes: Vec<u8>,
    mime: &str,
    width: Option<u32>,
    height: Option<u32>,
    max_dimension: u32,
) -> AppResult<Vec<u8>> {
    if width == Some(0) || height == Some(0) {
        return Err(AppError::Validation(
            "width and height must be positive".to_string(),
        ));
    }
    if width.is_none() && height.is_none() {
        return Ok(bytes);
    }
    check_bounds(width.unwrap_or(1), height.unwrap_or(1), max_dimension)?;

    let essence = normalize_mime(mime).unwrap_or_default();
    let format = ImageFormat::from_mime_type(&essence)
        .ok_or_else(|| AppError::Validation(format!("Cannot resize images of type {}", mime)))?;
    let img = image::load_from_memory_with_format(&bytes, format)?;

    let (w, h) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(img.height(), w, img.width())),
        (None, Some(h)) => (scaled(img.width(), h, img.height()), h),
        (None, None) => (img.width(), img.height()),
    };
    check_bounds(w, h, max_dimension)?;

    let resized = if width.is_some() && height.is_some() {
        img.resize_to_fill(w, h, FilterType::Lanczos3)
    } else {
        img.resize_exact(w, h, FilterType::Lanczos3)
    };

    encode(resized, format)
}

fn check_bounds(width: u32, height: u32, max_dimension: u32) -> AppResult<()> {
    if width > max_dimension || height > max_dimension {
        return Err(AppError::Validation(format!(
            "Resized image would be {}x{}; the limit is {} pixels per side",
            width, height, max_dimension
        )));
    }
    Ok(())
}

/// `other * target / current`, rounded; saturates at `u32::MAX` and never drops below 1.
fn scaled(other: u32, target: u32, current: u32) -> u32 {
    let value = (other as f64 * target as f64 / current.max(1) as f64).round() as u32;
    value.max(1)
}

fn encode(img: DynamicImage, format: ImageFormat) -> AppResult<Vec<u8>> {
    let img = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)?;
    Ok(out.into_inner())
}
