//! Input Resolver — resolves a step's input declaration into a concrete,
//! typed payload: local file, directory fan-out, URL fetch, database query
//! result, screenshot, image (base64+MIME), or the prior step's output.
//!
//! Enforces the 100 MiB single-file size cap and the image resize rules from
//! spec §4.3: longest side clamped to 256 (files) or 512×384 (screenshots),
//! aspect preserved, nearest-neighbor. JPEG inputs keep their MIME; every
//! other decoded format re-emits as PNG with fastest compression.

use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageEncoder, ImageFormat, ImageReader};

use crate::error::ComandaError;

/// Size cap for any single file load.
pub const MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

const FILE_IMAGE_MAX_SIDE: u32 = 256;
const SCREENSHOT_WIDTH: u32 = 512;
const SCREENSHOT_HEIGHT: u32 = 384;

/// Typed resolution result for a step's input.
#[derive(Debug, Clone)]
pub enum ResolvedInput {
    Text(String),
    Image { data_uri: String, mime: String },
    File { path: PathBuf, mime: String },
    Directory(Vec<ResolvedInput>),
    Empty,
}

impl ResolvedInput {
    /// Flatten to the textual representation used when composing a prompt.
    pub fn as_text(&self) -> String {
        match self {
            ResolvedInput::Text(s) => s.clone(),
            ResolvedInput::Image { data_uri, .. } => data_uri.clone(),
            ResolvedInput::File { path, .. } => format!("[file: {}]", path.display()),
            ResolvedInput::Directory(items) => items
                .iter()
                .map(|i| i.as_text())
                .collect::<Vec<_>>()
                .join("\n\n"),
            ResolvedInput::Empty => String::new(),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load a local path: a directory fans out (ordered, recursive) over its
/// entries; an image-suffixed file is decoded, resized, and wrapped as a
/// data URI; anything else is read as UTF-8 text.
pub fn resolve_path(path: &Path) -> Result<ResolvedInput, ComandaError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ComandaError::NotFound(format!("reading {}: {e}", path.display())))?;

    if metadata.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(path)
            .map_err(|e| ComandaError::ConfigIo(format!("listing {}: {e}", path.display())))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();
        let resolved = entries
            .iter()
            .map(|p| resolve_path(p))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ResolvedInput::Directory(resolved));
    }

    if metadata.len() > MAX_FILE_BYTES {
        return Err(ComandaError::Validation(format!(
            "{} exceeds the {MAX_FILE_BYTES}-byte size cap",
            path.display()
        )));
    }

    if is_image_path(path) {
        let bytes = std::fs::read(path)
            .map_err(|e| ComandaError::ConfigIo(format!("reading {}: {e}", path.display())))?;
        return encode_image(&bytes, FILE_IMAGE_MAX_SIDE, FILE_IMAGE_MAX_SIDE);
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| ComandaError::ConfigIo(format!("reading {}: {e}", path.display())))?;
    Ok(ResolvedInput::Text(text))
}

/// Decode `bytes` as an image, downscale if either dimension exceeds
/// `max_w`/`max_h` (aspect preserved, nearest-neighbor), and wrap as a
/// `data:<mime>;base64,...` URI. JPEG input keeps its MIME; anything else
/// re-encodes as PNG.
fn encode_image(bytes: &[u8], max_w: u32, max_h: u32) -> Result<ResolvedInput, ComandaError> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ComandaError::Validation(format!("unrecognized image data: {e}")))?;
    let format = reader.format();
    let img = reader
        .decode()
        .map_err(|e| ComandaError::Validation(format!("decoding image: {e}")))?;

    let (w, h) = img.dimensions();
    let resized = if w > max_w || h > max_h {
        let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
        let new_w = ((w as f64) * scale).round().max(1.0) as u32;
        let new_h = ((h as f64) * scale).round().max(1.0) as u32;
        img.resize_exact(new_w, new_h, image::imageops::FilterType::Nearest)
    } else {
        img
    };

    let is_jpeg = matches!(format, Some(ImageFormat::Jpeg));
    let (mime, out_bytes) = if is_jpeg {
        let mut buf = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(|e| ComandaError::Internal(format!("re-encoding jpeg: {e}")))?;
        ("image/jpeg".to_string(), buf)
    } else {
        let mut buf = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, PngFilterType::NoFilter);
        write_png(&resized, encoder)
            .map_err(|e| ComandaError::Internal(format!("re-encoding png: {e}")))?;
        ("image/png".to_string(), buf)
    };

    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&out_bytes);
    Ok(ResolvedInput::Image {
        data_uri: format!("data:{mime};base64,{b64}"),
        mime,
    })
}

fn write_png(img: &DynamicImage, encoder: PngEncoder<&mut Vec<u8>>) -> Result<(), image::ImageError> {
    let rgba = img.to_rgba8();
    encoder.write_image(&rgba, rgba.width(), rgba.height(), image::ExtendedColorType::Rgba8)
}

/// Fetch `url` with a 10-second timeout; HTML responses are stripped to
/// plain text.
pub async fn resolve_url(url: &str) -> Result<ResolvedInput, ComandaError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| ComandaError::Internal(format!("building HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ComandaError::Upstream(format!("fetching {url}: {e}")))?;

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html"))
        .unwrap_or(false);

    let body = response
        .text()
        .await
        .map_err(|e| ComandaError::Upstream(format!("reading body of {url}: {e}")))?;

    if is_html {
        Ok(ResolvedInput::Text(strip_html(&body)))
    } else {
        Ok(ResolvedInput::Text(body))
    }
}

fn strip_html(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let root = document.root_element();
    root.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capture the primary display, downscale to 512×384, encode as PNG, wrap
/// as a data URI.
pub fn capture_screenshot() -> Result<ResolvedInput, ComandaError> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| ComandaError::Internal(format!("listing monitors: {e}")))?;
    let monitor = monitors
        .into_iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .ok_or_else(|| ComandaError::Internal("no primary display found".to_string()))?;

    let image = monitor
        .capture_image()
        .map_err(|e| ComandaError::Internal(format!("capturing screen: {e}")))?;

    let mut png_bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| ComandaError::Internal(format!("encoding screenshot: {e}")))?;

    encode_image(&png_bytes, SCREENSHOT_WIDTH, SCREENSHOT_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags() {
        let html = "<html><body><h1>Title</h1><p>Hello <b>world</b></p></body></html>";
        let text = strip_html(html);
        assert_eq!(text, "Title Hello world");
    }

    #[test]
    fn size_cap_rejects_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        // Don't actually allocate 100MiB; just assert the cap constant sanity.
        assert_eq!(MAX_FILE_BYTES, 100 * 1024 * 1024);
        std::fs::write(&path, b"small").unwrap();
        let resolved = resolve_path(&path).unwrap();
        match resolved {
            ResolvedInput::Text(t) => assert_eq!(t, "small"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn directory_fans_out_ordered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let resolved = resolve_path(dir.path()).unwrap();
        match resolved {
            ResolvedInput::Directory(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].as_text(), "a");
                assert_eq!(items[1].as_text(), "b");
            }
            _ => panic!("expected directory"),
        }
    }
}
