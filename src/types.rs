//! Shared types used across all pipeline stages.
//!
//! [`Post`] and [`SceneCollection`] are the serialized shape of both snapshot
//! files (discovered and accepted). The stage values ([`ResolvedPost`],
//! [`DownloadedPost`], [`ProcessedPost`]) never hit disk: each stage consumes
//! the previous value and hands a richer one to the next, so a post can only
//! reach processing if it was resolved and downloaded first.

use crate::cache::CacheStatus;
use crate::imaging::Dimensions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One candidate tracked from discovery to the accepted set.
///
/// Discovery fills the descriptive fields; `image_url`, `width`, `height` and
/// `file` are only present on posts that made it through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Link as published. Its host selects the resolver.
    pub url: String,
    pub title: String,
    /// Absolute link to the discussion page.
    pub permalink: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
    /// Direct image URL chosen by the resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Cache file name of the downloaded image (relative to the download dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Post {
    /// A freshly discovered post: descriptive fields only.
    pub fn discovered(
        url: impl Into<String>,
        title: impl Into<String>,
        permalink: impl Into<String>,
        score: i64,
        created_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            permalink: permalink.into(),
            score,
            created_utc,
            image_url: None,
            width: None,
            height: None,
            file: None,
        }
    }

    /// Lowercased host of the source link, or an empty string if the link
    /// doesn't parse.
    pub fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_end_matches('.').to_ascii_lowercase()))
            .unwrap_or_default()
    }

    /// The discovery-time view of this post, with every pipeline field cleared.
    pub fn source_only(&self) -> Self {
        Self::discovered(
            self.url.clone(),
            self.title.clone(),
            self.permalink.clone(),
            self.score,
            self.created_utc,
        )
    }
}

/// Ordered sequence of posts: the only persisted artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneCollection {
    pub scenes: Vec<Post>,
}

impl SceneCollection {
    pub fn new(scenes: Vec<Post>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// A post paired with one direct image URL.
///
/// A gallery link fans out into several of these, all sharing the same
/// discovery metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPost {
    pub post: Post,
    pub image_url: String,
}

/// A resolved post whose image is on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPost {
    pub resolved: ResolvedPost,
    pub path: PathBuf,
    pub status: CacheStatus,
}

impl DownloadedPost {
    /// File name of the cached image.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A downloaded post that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPost {
    pub resolved: ResolvedPost,
    pub file: String,
    pub dimensions: Dimensions,
}

impl From<ProcessedPost> for Post {
    fn from(processed: ProcessedPost) -> Self {
        let ProcessedPost {
            resolved,
            file,
            dimensions,
        } = processed;
        Post {
            image_url: Some(resolved.image_url),
            width: Some(dimensions.width),
            height: Some(dimensions.height),
            file: Some(file),
            ..resolved.post.source_only()
        }
    }
}
