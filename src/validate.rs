//! Upload validation: extension, size, decodability, dimensions — checked
//! in that fixed order, first failure wins. Pure predicate, no side
//! effects; a decoder failure is a validation outcome, never a propagated
//! error.

use image::DynamicImage;
use thiserror::Error;

use crate::config::ValidationLimits;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Formato de archivo no permitido")]
    InvalidImageFormat,

    #[error("Archivo demasiado grande (máximo {max_mb}MB)")]
    ImageTooLarge { max_mb: u64 },

    #[error("Archivo no es una imagen válida")]
    ImageInvalid,

    #[error("Dimensiones inválidas ({min}-{max}px)")]
    InvalidImageDimensions { min: u32, max: u32 },
}

/// A validated upload: decoded pixels plus the normalized extension.
pub struct ValidatedImage {
    pub image: DynamicImage,
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for ValidatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedImage")
            .field("extension", &self.extension)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Validate an uploaded file. Checks run in a fixed order and
/// short-circuit on the first failure:
/// extension → byte size → decodability → dimensions.
pub fn validate_upload(
    filename: &str,
    bytes: &[u8],
    limits: &ValidationLimits,
) -> Result<ValidatedImage, ValidationError> {
    let extension = extension_of(filename)
        .filter(|ext| limits.allowed_extensions.contains(&ext.as_str()))
        .ok_or(ValidationError::InvalidImageFormat)?;

    let size = bytes.len() as u64;
    if size == 0 || size > limits.max_file_size {
        return Err(ValidationError::ImageTooLarge {
            max_mb: limits.max_file_size / 1024 / 1024,
        });
    }

    let image = image::load_from_memory(bytes).map_err(|e| {
        tracing::debug!(filename, error = %e, "Upload failed to decode");
        ValidationError::ImageInvalid
    })?;

    let (width, height) = (image.width(), image.height());
    let in_range = |d: u32| (limits.min_dimension..=limits.max_dimension).contains(&d);
    if !in_range(width) || !in_range(height) {
        return Err(ValidationError::InvalidImageDimensions {
            min: limits.min_dimension,
            max: limits.max_dimension,
        });
    }

    Ok(ValidatedImage {
        image,
        extension,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn limits() -> ValidationLimits {
        ValidationLimits::default()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn accepts_valid_png() {
        let validated = validate_upload("torax.png", &png_bytes(500, 500), &limits()).unwrap();
        assert_eq!(validated.extension, "png");
        assert_eq!((validated.width, validated.height), (500, 500));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(validate_upload("torax.PNG", &png_bytes(500, 500), &limits()).is_ok());
        // Decoding is content-sniffed, so a mislabeled extension still
        // passes as long as it is in the allowlist.
        assert!(validate_upload("torax.JpEg", &png_bytes(500, 500), &limits()).is_ok());
    }

    #[test]
    fn rejects_disallowed_extension_regardless_of_content() {
        // Valid PNG bytes, wrong extension: format error, not decode error.
        let err = validate_upload("torax.webp", &png_bytes(500, 500), &limits()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidImageFormat);
    }

    #[test]
    fn rejects_missing_extension() {
        let err = validate_upload("torax", &png_bytes(500, 500), &limits()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidImageFormat);
    }

    #[test]
    fn format_error_wins_over_size_error() {
        // Oversized AND wrong extension: the fixed check order reports
        // the format problem.
        let big = vec![0u8; 11 * 1024 * 1024];
        let err = validate_upload("torax.tiff", &big, &limits()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidImageFormat);
    }

    #[test]
    fn rejects_empty_file_as_too_large_check_failure() {
        let err = validate_upload("torax.png", &[], &limits()).unwrap_err();
        assert!(matches!(err, ValidationError::ImageTooLarge { .. }));
    }

    #[test]
    fn rejects_file_over_ten_mib() {
        let big = vec![0u8; 10 * 1024 * 1024 + 1];
        let err = validate_upload("torax.png", &big, &limits()).unwrap_err();
        assert!(matches!(err, ValidationError::ImageTooLarge { .. }));
    }

    #[test]
    fn accepts_file_at_exactly_ten_mib_boundary_check() {
        // Exactly 10 MiB passes the size gate; the garbage content then
        // fails decoding, proving the order of checks.
        let at_limit = vec![0u8; 10 * 1024 * 1024];
        let err = validate_upload("torax.png", &at_limit, &limits()).unwrap_err();
        assert_eq!(err, ValidationError::ImageInvalid);
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let err = validate_upload("torax.jpg", b"not an image at all", &limits()).unwrap_err();
        assert_eq!(err, ValidationError::ImageInvalid);
    }

    #[test]
    fn rejects_too_small_dimensions() {
        let err = validate_upload("torax.png", &png_bytes(99, 500), &limits()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidImageDimensions { .. }));
    }

    #[test]
    fn accepts_minimum_dimension_boundary() {
        assert!(validate_upload("torax.png", &png_bytes(100, 100), &limits()).is_ok());
    }

    #[test]
    fn either_axis_out_of_range_rejects() {
        let err = validate_upload("torax.png", &png_bytes(500, 99), &limits()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidImageDimensions { .. }));
    }
}
