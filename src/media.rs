//! Upload validation and image derivatives.

use std::io::Cursor;

use chrono::{DateTime, Datelike, Utc};
use image::{DynamicImage, ImageFormat, ImageReader, imageops::FilterType};
use thiserror::Error;
use uuid::Uuid;

pub const THUMBNAIL: &str = "thumbnail";
pub const MEDIUM: &str = "medium";

const THUMBNAIL_SIZE: u32 = 150;
const MEDIUM_BOX: u32 = 768;

/// Accepted MIME types and the extension their objects are stored with.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("file is not a readable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("file content is {detected}, not {declared}")]
    TypeMismatch { declared: String, detected: String },
    #[error("image processing was interrupted")]
    Interrupted,
}

pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}

pub fn is_raster(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// `YYYY/MM/<uuid>.<ext>`; user-supplied names never reach the key.
pub fn storage_key(now: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{:04}/{:02}/{}.{}",
        now.year(),
        now.month(),
        Uuid::new_v4(),
        extension
    )
}

/// `2025/01/abc.png` + `thumbnail` -> `2025/01/abc-thumbnail.png`.
pub fn variant_key(key: &str, variant: &str) -> String {
    match key.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
            format!("{stem}-{variant}.{ext}")
        }
        _ => format!("{key}-{variant}"),
    }
}

/// Cheap content check for PDFs, which are stored as-is.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

#[derive(Debug)]
pub struct Derivative {
    pub name: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
    pub derivatives: Vec<Derivative>,
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format)?;
    Ok(buf)
}

/// Decodes `bytes`, checks the sniffed format against `declared_mime`, and renders the
/// derivatives in the original's format. CPU-bound; call through [`process_image`].
pub fn process_image_sync(bytes: &[u8], declared_mime: &str) -> Result<ProcessedImage, MediaError> {
    let now = std::time::Instant::now();
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let format = reader
        .format()
        .ok_or(MediaError::TypeMismatch {
            declared: declared_mime.to_string(),
            detected: "unknown".to_string(),
        })?;
    if format.to_mime_type() != declared_mime {
        return Err(MediaError::TypeMismatch {
            declared: declared_mime.to_string(),
            detected: format.to_mime_type().to_string(),
        });
    }
    let original = reader.decode()?;
    tracing::debug!("decoded [{:?}]", now.elapsed());

    let mut derivatives = Vec::with_capacity(2);

    let thumb = original.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    derivatives.push(Derivative {
        name: THUMBNAIL,
        bytes: encode(&thumb, format)?,
        width: thumb.width(),
        height: thumb.height(),
    });

    if original.width() > MEDIUM_BOX || original.height() > MEDIUM_BOX {
        let medium = original.resize(MEDIUM_BOX, MEDIUM_BOX, FilterType::Lanczos3);
        derivatives.push(Derivative {
            name: MEDIUM,
            bytes: encode(&medium, format)?,
            width: medium.width(),
            height: medium.height(),
        });
    }
    tracing::debug!("derivatives ready [{:?}]", now.elapsed());

    Ok(ProcessedImage {
        width: original.width(),
        height: original.height(),
        derivatives,
    })
}

/// Runs [`process_image_sync`] on the blocking pool.
pub async fn process_image(bytes: Vec<u8>, declared_mime: String) -> Result<ProcessedImage, MediaError> {
    tokio::task::spawn_blocking(move || process_image_sync(&bytes, &declared_mime))
        .await
        .map_err(|e| {
            tracing::error!("image worker failed: {:?}", e);
            MediaError::Interrupted
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png).unwrap()
    }

    #[test]
    fn allowed_types() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("application/pdf"), Some("pdf"));
        assert_eq!(extension_for("text/html"), None);
        assert!(is_raster("image/webp"));
        assert!(!is_raster("application/pdf"));
    }

    #[test]
    fn keys() {
        let now = DateTime::parse_from_rfc3339("2025-03-09T10:00:00Z").unwrap().with_timezone(&Utc);
        let key = storage_key(now, "png");
        assert!(key.starts_with("2025/03/"));
        assert!(key.ends_with(".png"));
        assert_eq!(variant_key("2025/03/abc.png", THUMBNAIL), "2025/03/abc-thumbnail.png");
        assert_eq!(variant_key("2025/03/abc", MEDIUM), "2025/03/abc-medium");
    }

    #[test]
    fn large_image_gets_both_derivatives() {
        let processed = process_image_sync(&png(1000, 500), "image/png").unwrap();
        assert_eq!((processed.width, processed.height), (1000, 500));

        let thumb = &processed.derivatives[0];
        assert_eq!(thumb.name, THUMBNAIL);
        assert_eq!((thumb.width, thumb.height), (150, 150));

        let medium = &processed.derivatives[1];
        assert_eq!(medium.name, MEDIUM);
        assert_eq!((medium.width, medium.height), (768, 384));
        assert!(image::load_from_memory(&medium.bytes).is_ok());
    }

    #[test]
    fn small_image_gets_only_thumbnail() {
        let processed = process_image_sync(&png(100, 80), "image/png").unwrap();
        assert_eq!(processed.derivatives.len(), 1);
        assert_eq!(processed.derivatives[0].name, THUMBNAIL);
    }

    #[test]
    fn declared_type_must_match_content() {
        let err = process_image_sync(&png(10, 10), "image/jpeg").unwrap_err();
        assert!(matches!(err, MediaError::TypeMismatch { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(process_image_sync(b"definitely not an image", "image/png").is_err());
    }

    #[test]
    fn pdf_magic() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"<html>"));
    }
}
