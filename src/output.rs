//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **post-centric, not file-centric**. The primary display for a
//! post is its identity on the source: score and title. Hosts, cache files,
//! and error causes follow as secondary context, either inline or on
//! indented lines, so the output reads as an inventory of the crawl while
//! still letting users trace a failure to a URL or file.
//!
//! # Output Format
//!
//! ## Discover
//!
//! ```text
//! Discovered 3 posts → drop/posts.json
//! 001 [412] Morning fog over the harbour
//!     https://i.redd.it/k3x9.jpg
//! 002 [388] Tide pools
//!     https://imgur.com/a/Xy12z
//! ```
//!
//! ## Run
//!
//! One line per outcome, as posts complete:
//!
//! ```text
//! OK: [412] Morning fog over the harbour
//! Not supported domain flickr.com: [300] Old mill
//! Error at imgur.com: [120] Canyon
//!     HTTP error: https://imgur.com/a/gone1 returned HTTP 404
//! Accepted: [412] Morning fog over the harbour
//!     i.redd.it_k3x9.jpg 2400x1000
//! Rejected: [95] Portrait
//!     p0rt.jpg: rejected: aspect ratio 0.75 outside 1.20..4.00
//! ```
//!
//! ## Summary
//!
//! ```text
//! Discovered: 50 posts
//! Resolved:   58 images (3 unsupported, 1 without images, 1 failed)
//! Downloads:  40 cached, 16 downloaded (56 total), 2 failed
//! Accepted:   51 (5 rejected) → out/posts.json
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::cache::CacheStatus;
use crate::pipeline::{PipelineEvent, RunStats};
use crate::types::{Post, SceneCollection};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// A post's identity: `[score] title`.
fn post_label(post: &Post) -> String {
    format!("[{}] {}", post.score, post.title)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

// ============================================================================
// Discover
// ============================================================================

/// Format the discovered set with its snapshot location.
pub fn format_discovery(collection: &SceneCollection, snapshot: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Discovered {} \u{2192} {}",
        plural(collection.len(), "post", "posts"),
        snapshot.display()
    )];
    for (i, post) in collection.scenes.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), post_label(post)));
        lines.push(format!("{}{}", indent(1), post.url));
    }
    lines
}

/// Print discovery output to stdout.
pub fn print_discovery(collection: &SceneCollection, snapshot: &Path) {
    for line in format_discovery(collection, snapshot) {
        println!("{}", line);
    }
}

// ============================================================================
// Run events
// ============================================================================

/// Format a single pipeline event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Resolved { post, images, .. } => {
            if *images > 1 {
                vec![format!("OK: {} ({} images)", post_label(post), images)]
            } else {
                vec![format!("OK: {}", post_label(post))]
            }
        }
        PipelineEvent::Unsupported { post, .. } => vec![format!(
            "Not supported domain {}: {}",
            post.host(),
            post_label(post)
        )],
        PipelineEvent::NoImages { post, .. } => vec![format!(
            "No images at {}: {}",
            post.host(),
            post_label(post)
        )],
        PipelineEvent::ResolveFailed { post, error, .. } => vec![
            format!("Error at {}: {}", post.host(), post_label(post)),
            format!("{}{}", indent(1), error),
        ],
        PipelineEvent::Downloaded {
            post, file, status, ..
        } => {
            let verb = match status {
                CacheStatus::Hit => "Cached",
                CacheStatus::Fetched => "Downloaded",
            };
            vec![format!("{} {}: {}", verb, file, post_label(post))]
        }
        PipelineEvent::DownloadFailed {
            post,
            image_url,
            error,
            ..
        } => vec![
            format!("Download failed: {}", post_label(post)),
            format!("{}{}: {}", indent(1), image_url, error),
        ],
        PipelineEvent::Accepted { post, .. } => {
            let mut lines = vec![format!("Accepted: {}", post_label(post))];
            if let (Some(file), Some(w), Some(h)) = (&post.file, post.width, post.height) {
                lines.push(format!("{}{} {}x{}", indent(1), file, w, h));
            }
            lines
        }
        PipelineEvent::Rejected {
            post, file, reason, ..
        } => vec![
            format!("Rejected: {}", post_label(post)),
            format!("{}{}: {}", indent(1), file, reason),
        ],
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format run counters. `accepted_snapshot` is shown when the accepted set
/// was written.
pub fn format_summary(stats: &RunStats, accepted_snapshot: Option<&Path>) -> Vec<String> {
    let mut lines = vec![format!(
        "Discovered: {}",
        plural(stats.discovered, "post", "posts")
    )];

    let mut skipped = Vec::new();
    if stats.unsupported > 0 {
        skipped.push(format!("{} unsupported", stats.unsupported));
    }
    if stats.unresolved > 0 {
        skipped.push(format!("{} without images", stats.unresolved));
    }
    if stats.resolve_failures > 0 {
        skipped.push(format!("{} failed", stats.resolve_failures));
    }
    let resolved = plural(stats.resolved_images, "image", "images");
    if skipped.is_empty() {
        lines.push(format!("Resolved:   {}", resolved));
    } else {
        lines.push(format!("Resolved:   {} ({})", resolved, skipped.join(", ")));
    }

    if let Some(path) = accepted_snapshot {
        if stats.download_failures > 0 {
            lines.push(format!(
                "Downloads:  {}, {} failed",
                stats.cache, stats.download_failures
            ));
        } else {
            lines.push(format!("Downloads:  {}", stats.cache));
        }
        let rejected = if stats.rejections > 0 {
            format!(" ({} rejected)", stats.rejections)
        } else {
            String::new()
        };
        lines.push(format!(
            "Accepted:   {}{} \u{2192} {}",
            stats.accepted,
            rejected,
            path.display()
        ));
    }
    lines
}

/// Print the run summary to stdout.
pub fn print_summary(stats: &RunStats, accepted_snapshot: Option<&Path>) {
    for line in format_summary(stats, accepted_snapshot) {
        println!("{}", line);
    }
}
