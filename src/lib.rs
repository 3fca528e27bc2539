//! # Scene Crawler
//!
//! Collects side-by-side ("cross-view") stereo photographs from a Reddit
//! community into a validated local set. Each run discovers top posts, turns
//! their links into direct image URLs, downloads the images into a cache
//! directory, checks that each one is shaped like a stereo pair, and writes the
//! accepted posts as a JSON snapshot.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Discover   reddit listing  →  drop/posts.json   (candidate posts)
//! 2. Resolve    post link       →  image URL(s)      (per-host strategies)
//! 3. Download   image URL       →  drop/<file>       (cached, atomic)
//! 4. Validate   local file      →  out/posts.json    (accepted posts + sizes)
//! ```
//!
//! Discovery writes its own snapshot so later runs can resume without asking
//! the source again. Stages 2–4 run per post, in parallel, and a failure in
//! one post never touches another.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discovery`] | Stage 1: `Source` trait and the Reddit listing client (public or OAuth) |
//! | [`resolve`] | Stage 2: host-keyed `ResolverRegistry` with direct, imgur, and Reddit gallery resolvers |
//! | [`cache`] | Stage 3: deterministic cache file names, hit detection, per-path locks |
//! | [`fetch`] | Stage 3: temp-file downloads renamed into place on success |
//! | [`process`] | Stage 4: stereo shape policy and per-image timeout |
//! | [`imaging`] | `ImageBackend` trait and the pure Rust `image` crate backend |
//! | [`pipeline`] | Orchestrator: per-post state machine, fan-out, events, run statistics |
//! | [`store`] | Atomic JSON snapshot save/load |
//! | [`config`] | `crawler.toml` loading, stock defaults, validation, credentials from env |
//! | [`http`] | `Transport` trait and the blocking `reqwest` implementation |
//! | [`types`] | `Post`, `SceneCollection`, and the per-stage values |
//! | [`output`] | CLI output formatting for discovery, progress, and the summary |
//!
//! # Design Decisions
//!
//! ## Immutable Stage Values
//!
//! A post is never mutated as it moves through the pipeline. Each stage takes
//! the previous value and returns a richer one (`Post` → `ResolvedPost` →
//! `DownloadedPost` → `ProcessedPost`), so "this post has dimensions" is a
//! type, not a hope about which fields are set.
//!
//! ## Resolvers Are Registered, Not Matched
//!
//! Hosts map to [`resolve::Resolver`] values in a table. Supporting a new
//! image host is one `register` call; the pipeline never branches on host
//! names. Unknown hosts are an expected outcome ("unsupported"), not an error.
//!
//! ## Narrow Seams for Everything External
//!
//! The network sits behind [`http::Transport`] and image decoding behind
//! [`imaging::ImageBackend`]. Tests swap in in-memory implementations and run
//! the full pipeline without sockets.
//!
//! ## Crash-Safe Files
//!
//! Downloads and snapshots are written to a temp file in the target directory
//! and renamed into place. An interrupted run leaves the previous file or
//! nothing, never half of one, so the cache and the resume snapshot can
//! always be trusted.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod fetch;
pub mod http;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod resolve;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
