//! Shared test utilities for the scene-crawler test suite.
//!
//! Provides post builders and real image fixtures so tests exercise the
//! actual decoders instead of byte blobs.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let post = sample_post("https://i.redd.it/a.jpg", "Dusk", 12);
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_png(&tmp.path().join("a.jpg"), 400, 200);
//! ```

use crate::types::Post;
use chrono::{TimeZone, Utc};
use image::{ImageFormat, RgbImage};
use std::path::Path;

// =========================================================================
// Posts
// =========================================================================

/// A discovered post with a permalink derived from the title.
pub fn sample_post(url: &str, title: &str, score: i64) -> Post {
    let slug: String = title
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    Post::discovered(
        url,
        title,
        format!("https://www.reddit.com/r/crossview/comments/t{score}/{slug}/"),
        score,
        Utc.with_ymd_and_hms(2018, 6, 1, 12, 0, 0).unwrap(),
    )
}

// =========================================================================
// Image fixtures
// =========================================================================

/// Gradient pixels so encoded files don't collapse to a few bytes.
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    })
}

/// Write a PNG of the given size to `path`, whatever its extension.
pub fn write_png(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Encode a PNG of the given size into memory.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
