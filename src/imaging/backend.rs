//! Image inspection backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the processor needs:
//! a cheap `identify` that reads dimensions from the header, and a `verify`
//! that decodes every pixel so truncated or corrupt files are caught.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure Rust decoders.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image format: {0}")]
    UnknownFormat(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Width over height. Zero height gives zero.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Trait for image inspection backends.
///
/// `Send + Sync` so one backend can be shared across rayon workers and the
/// processor's timeout thread.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions from the image header.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the whole image and return its dimensions.
    fn verify(&self, path: &Path) -> Result<Dimensions, BackendError>;
}
