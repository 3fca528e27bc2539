//! Links that already point at an image file.

use super::{ResolveError, Resolver, image_extension};
use crate::http::Transport;
use url::Url;

/// Accepts the URL as-is when its path ends in an image extension.
///
/// Anything else on an image host (`.gifv`, `.mp4`, bare ids) is not a still
/// image and resolves to nothing.
pub struct DirectResolver;

impl Resolver for DirectResolver {
    fn resolve(&self, url: &Url, _transport: &dyn Transport) -> Result<Vec<String>, ResolveError> {
        Ok(match image_extension(url) {
            Some(_) => vec![url.to_string()],
            None => Vec::new(),
        })
    }
}
