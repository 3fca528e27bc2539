//! URL resolution: from a post's published link to direct image URLs.
//!
//! Each supported host gets a [`Resolver`]; the [`ResolverRegistry`] picks one
//! by the link's lowercased host. A host without a registration resolves to
//! an empty list, which the pipeline reports as "unsupported" rather than an
//! error.
//!
//! | Host | Resolver | Network |
//! |---|---|---|
//! | `i.redd.it`, `i.imgur.com` | [`DirectResolver`] | no |
//! | `imgur.com`, `www.imgur.com`, `m.imgur.com` | [`ImgurResolver`] | albums only |
//! | `reddit.com`, `www.reddit.com`, `old.reddit.com` | [`RedditResolver`] | yes |
//!
//! Adding a host means registering a resolver value, not branching on type.

mod direct;
mod imgur;
mod reddit;

pub use direct::DirectResolver;
pub use imgur::ImgurResolver;
pub use reddit::RedditResolver;

use crate::http::{HttpError, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected page content: {0}")]
    Malformed(String),
}

/// Strategy turning one landing-page URL into zero or more image URLs.
pub trait Resolver: Send + Sync {
    fn resolve(&self, url: &Url, transport: &dyn Transport) -> Result<Vec<String>, ResolveError>;
}

/// Image extensions a direct link may carry.
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Lowercased extension of the last path segment, if it is an image extension.
pub(crate) fn image_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Host-keyed resolver table.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    by_host: HashMap<String, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    /// Empty registry: every host is unsupported.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in hosts from the module table.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let direct: Arc<dyn Resolver> = Arc::new(DirectResolver);
        let imgur: Arc<dyn Resolver> = Arc::new(ImgurResolver);
        let reddit: Arc<dyn Resolver> = Arc::new(RedditResolver);
        for host in ["i.redd.it", "i.imgur.com"] {
            registry.register(host, direct.clone());
        }
        for host in ["imgur.com", "www.imgur.com", "m.imgur.com"] {
            registry.register(host, imgur.clone());
        }
        for host in ["reddit.com", "www.reddit.com", "old.reddit.com"] {
            registry.register(host, reddit.clone());
        }
        registry
    }

    /// Register (or replace) the resolver for `host`.
    pub fn register(&mut self, host: &str, resolver: Arc<dyn Resolver>) {
        self.by_host.insert(normalize_host(host), resolver);
    }

    /// Whether `source_url` has a registered resolver.
    pub fn supports(&self, source_url: &str) -> bool {
        Url::parse(source_url)
            .ok()
            .and_then(|u| u.host_str().map(normalize_host))
            .is_some_and(|h| self.by_host.contains_key(&h))
    }

    /// Resolve `source_url` into direct image URLs.
    ///
    /// Unsupported hosts yield an empty list. Duplicates are removed while
    /// keeping first-seen order.
    pub fn resolve(
        &self,
        source_url: &str,
        transport: &dyn Transport,
    ) -> Result<Vec<String>, ResolveError> {
        let url = Url::parse(source_url)?;
        let Some(host) = url.host_str().map(normalize_host) else {
            return Ok(Vec::new());
        };
        let Some(resolver) = self.by_host.get(&host) else {
            return Ok(Vec::new());
        };
        let mut urls = resolver.resolve(&url, transport)?;
        let mut seen = std::collections::HashSet::new();
        urls.retain(|u| seen.insert(u.clone()));
        Ok(urls)
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}
