//! imgur landing pages.
//!
//! - `imgur.com/<id>` and `imgur.com/<id>.<ext>`: rewritten to
//!   `https://i.imgur.com/<id>.<ext>` (`jpg` when no extension). imgur serves
//!   the image under any extension, so no request is needed.
//! - `imgur.com/a/<id>` and `imgur.com/gallery/<id>`: the album page is
//!   fetched and every `i.imgur.com/<id>.<ext>` reference is returned in
//!   page order. Repeats are left for the registry to drop.

use super::{ResolveError, Resolver, image_extension};
use crate::http::Transport;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)i\.imgur\.com/([A-Za-z0-9]{5,10})\.(jpe?g|png|gif|webp)\b")
        .expect("image reference pattern must compile")
});

pub struct ImgurResolver;

impl Resolver for ImgurResolver {
    fn resolve(&self, url: &Url, transport: &dyn Transport) -> Result<Vec<String>, ResolveError> {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["a" | "gallery", id, ..] => resolve_album(id, transport),
            [single] => Ok(single_image(url, single).into_iter().collect()),
            _ => Ok(Vec::new()),
        }
    }
}

fn single_image(url: &Url, segment: &str) -> Option<String> {
    let id = segment.split('.').next().filter(|id| !id.is_empty())?;
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    match segment.rsplit_once('.') {
        // A non-image extension (gifv, mp4) is a video
        Some(_) if image_extension(url).is_none() => None,
        _ => {
            let ext = image_extension(url).unwrap_or_else(|| "jpg".to_string());
            Some(format!("https://i.imgur.com/{id}.{ext}"))
        }
    }
}

fn resolve_album(id: &str, transport: &dyn Transport) -> Result<Vec<String>, ResolveError> {
    let page = transport.get_text(&format!("https://imgur.com/a/{id}"), &[])?;
    Ok(IMAGE_REF
        .captures_iter(&page)
        .map(|c| {
            format!(
                "https://i.imgur.com/{}.{}",
                &c[1],
                c[2].to_ascii_lowercase()
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockTransport;

    fn resolve_with(s: &str, transport: &MockTransport) -> Vec<String> {
        ImgurResolver
            .resolve(&Url::parse(s).unwrap(), transport)
            .unwrap()
    }

    #[test]
    fn single_id_gets_jpg_extension() {
        let transport = MockTransport::new();
        assert_eq!(
            resolve_with("https://imgur.com/Ab3dE9x", &transport),
            vec!["https://i.imgur.com/Ab3dE9x.jpg"]
        );
        assert!(transport.get_requests().is_empty());
    }

    #[test]
    fn single_id_keeps_image_extension() {
        assert_eq!(
            resolve_with("https://m.imgur.com/Ab3dE9x.png", &MockTransport::new()),
            vec!["https://i.imgur.com/Ab3dE9x.png"]
        );
    }

    #[test]
    fn single_video_is_dropped() {
        assert!(resolve_with("https://imgur.com/Ab3dE9x.gifv", &MockTransport::new()).is_empty());
    }

    #[test]
    fn album_page_fans_out_in_page_order() {
        let page = r#"<html>
            <meta property="og:image" content="https://i.imgur.com/FirstAa.jpg?fb">
            <img src="//i.imgur.com/SecondB.png">
            <img src="//i.imgur.com/FirstAa.jpg">
        </html>"#;
        let transport = MockTransport::new().with_body("https://imgur.com/a/alb12", page);

        let urls = ImgurResolver
            .resolve(&Url::parse("https://imgur.com/a/alb12").unwrap(), &transport)
            .unwrap();
        // Duplicates are removed by the registry, not here
        assert_eq!(
            urls,
            vec![
                "https://i.imgur.com/FirstAa.jpg",
                "https://i.imgur.com/SecondB.png",
                "https://i.imgur.com/FirstAa.jpg",
            ]
        );
    }

    #[test]
    fn gallery_path_uses_album_page() {
        let transport = MockTransport::new()
            .with_body("https://imgur.com/a/g4ll3ry", "i.imgur.com/OnlyOne.jpg");
        assert_eq!(
            resolve_with("https://imgur.com/gallery/g4ll3ry", &transport),
            vec!["https://i.imgur.com/OnlyOne.jpg"]
        );
    }

    #[test]
    fn missing_album_is_error() {
        let transport = MockTransport::new().with_status("https://imgur.com/a/gone1", 404);
        let result =
            ImgurResolver.resolve(&Url::parse("https://imgur.com/a/gone1").unwrap(), &transport);
        assert!(matches!(result, Err(ResolveError::Http(_))));
    }

    #[test]
    fn other_paths_resolve_to_nothing() {
        assert!(resolve_with("https://imgur.com/user/someone/posts", &MockTransport::new()).is_empty());
    }
}
