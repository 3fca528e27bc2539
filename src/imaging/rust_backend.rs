//! Pure Rust inspection backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `ImageReader::with_guessed_format` (magic bytes) |
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Verify | `ImageReader::decode` (JPEG, PNG, TIFF, WebP, GIF) |
//!
//! Cache files are named after URLs and their extensions may lie (imgur
//! serves PNGs under `.jpg`), so the format always comes from the content.

use super::backend::{BackendError, Dimensions, ImageBackend};
use image::{ImageFormat, ImageReader};
use std::io::BufReader;
use std::fs::File;
use std::path::Path;

/// Formats whose decoders are compiled in.
const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open `path` with the format sniffed from its first bytes.
fn open(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    match reader.format() {
        Some(format) if DECODABLE.contains(&format) => Ok(reader),
        Some(format) => Err(BackendError::UnknownFormat(format!(
            "{} ({:?})",
            path.display(),
            format
        ))),
        None => Err(BackendError::UnknownFormat(path.display().to_string())),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open(path)?.into_dimensions().map_err(|e| {
            BackendError::DecodeFailed(format!("{}: {}", path.display(), e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn verify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let img = open(path)?
            .decode()
            .map_err(|e| BackendError::DecodeFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }
}
