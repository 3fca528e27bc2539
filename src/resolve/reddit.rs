//! Reddit-hosted galleries and link posts.
//!
//! Gallery links (`/gallery/<id>`) and comment links (`/comments/<id>`,
//! `/r/<sub>/comments/<id>/...`) are resolved through the post's JSON:
//!
//! 1. a gallery yields `https://i.redd.it/<media_id>.<ext>` per item, in
//!    gallery order, skipping media that isn't `valid` or isn't an image;
//! 2. otherwise the post's own destination is used when it is a direct
//!    image link;
//! 3. otherwise the first crosspost parent is tried the same way.

use super::{ResolveError, Resolver, image_extension};
use crate::http::Transport;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

pub struct RedditResolver;

impl Resolver for RedditResolver {
    fn resolve(&self, url: &Url, transport: &dyn Transport) -> Result<Vec<String>, ResolveError> {
        let Some(id) = post_id(url) else {
            return Ok(Vec::new());
        };
        let body = transport.get_text(
            &format!("https://www.reddit.com/comments/{id}.json?raw_json=1"),
            &[],
        )?;
        let listings: Vec<Listing> = serde_json::from_str(&body)?;
        let post = listings
            .into_iter()
            .next()
            .and_then(|l| l.data.children.into_iter().next())
            .map(|c| c.data)
            .ok_or_else(|| ResolveError::Malformed(format!("no post in listing for {id}")))?;

        let mut urls = post.image_urls();
        if urls.is_empty()
            && let Some(parent) = post.crosspost_parent_list.first()
        {
            urls = parent.image_urls();
        }
        Ok(urls)
    }
}

/// Post id from a gallery or comments path.
fn post_id(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let id = match segments.as_slice() {
        ["gallery", id, ..] | ["comments", id, ..] | ["r", _, "comments", id, ..] => *id,
        _ => return None,
    };
    id.chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then(|| id.to_string())
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Default, Deserialize)]
struct PostData {
    url_overridden_by_dest: Option<String>,
    url: Option<String>,
    gallery_data: Option<GalleryData>,
    media_metadata: Option<HashMap<String, MediaItem>>,
    #[serde(default)]
    crosspost_parent_list: Vec<PostData>,
}

#[derive(Debug, Deserialize)]
struct GalleryData {
    #[serde(default)]
    items: Vec<GalleryItem>,
}

#[derive(Debug, Deserialize)]
struct GalleryItem {
    media_id: String,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    status: Option<String>,
    /// MIME type, e.g. `image/jpg`.
    m: Option<String>,
}

impl PostData {
    fn image_urls(&self) -> Vec<String> {
        if let Some(gallery) = &self.gallery_data {
            let metadata = self.media_metadata.as_ref();
            return gallery
                .items
                .iter()
                .filter_map(|item| {
                    let media = metadata?.get(&item.media_id)?;
                    if media.status.as_deref().is_some_and(|s| s != "valid") {
                        return None;
                    }
                    let ext = media.m.as_deref().and_then(mime_extension)?;
                    Some(format!("https://i.redd.it/{}.{}", item.media_id, ext))
                })
                .collect();
        }

        self.url_overridden_by_dest
            .as_deref()
            .or(self.url.as_deref())
            .and_then(|dest| Url::parse(dest).ok())
            .filter(|dest| dest.host_str() == Some("i.redd.it") && image_extension(dest).is_some())
            .map(|dest| vec![dest.to_string()])
            .unwrap_or_default()
    }
}

fn mime_extension(mime: &str) -> Option<&'static str> {
    match mime.to_ascii_lowercase().as_str() {
        "image/jpg" | "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
