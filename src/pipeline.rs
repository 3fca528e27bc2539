//! Crawl orchestration: resolve → download → validate, per post.
//!
//! Every discovered post walks an explicit state machine:
//!
//! ```text
//! Discovered ──► Resolved(1..n) ──► Downloaded ──► Processed (accepted)
//!      │                │                 │
//!      ├─► Unsupported  └─► DownloadFailed └─► Rejected
//!      ├─► NoImages
//!      └─► ResolveFailed
//! ```
//!
//! Each transition consumes the previous stage's value and produces the next
//! one ([`ResolvedPost`] → [`DownloadedPost`] → [`ProcessedPost`]). Nothing
//! is mutated in place, so a post that stops early simply has no later value.
//!
//! ## Failure isolation
//!
//! Resolution, download, and validation errors are caught here, logged with
//! the post's host, score, and title, reported as a [`PipelineEvent`], and
//! the post is dropped. No per-post error escapes [`Pipeline::run`].
//!
//! ## Fan-out
//!
//! A gallery link resolves to several images. With [`FanOut::All`] each image
//! continues as its own value carrying the source post's metadata; with
//! [`FanOut::First`] only the first image continues.
//!
//! ## Parallelism
//!
//! Posts are independent and run on the global rayon pool. Results are
//! collected in input order, so the accepted set follows discovery order no
//! matter which worker finishes first.

use crate::cache::{CacheStats, CacheStatus, DownloadCache};
use crate::fetch::{FetchError, Fetcher};
use crate::http::Transport;
use crate::process::{ProcessError, Processor};
use crate::resolve::{ResolveError, ResolverRegistry};
use crate::types::{DownloadedPost, Post, ProcessedPost, ResolvedPost, SceneCollection};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// How many resolved images one source link contributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// One downstream value per resolved image.
    #[default]
    All,
    /// Only the first resolved image.
    First,
}

/// Progress report for one post, sent to the CLI printer.
///
/// `index` is the post's 1-based position in the discovered snapshot.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Resolved {
        index: usize,
        post: Post,
        images: usize,
    },
    Unsupported {
        index: usize,
        post: Post,
    },
    NoImages {
        index: usize,
        post: Post,
    },
    ResolveFailed {
        index: usize,
        post: Post,
        error: String,
    },
    Downloaded {
        index: usize,
        post: Post,
        file: String,
        status: CacheStatus,
    },
    DownloadFailed {
        index: usize,
        post: Post,
        image_url: String,
        error: String,
    },
    /// Carries the accepted post, with dimensions and file set.
    Accepted {
        index: usize,
        post: Post,
    },
    Rejected {
        index: usize,
        post: Post,
        file: String,
        reason: String,
    },
}

/// Outcome of resolving one post.
#[derive(Debug)]
pub enum Resolution {
    /// At least one image, after the fan-out policy.
    Resolved(Vec<ResolvedPost>),
    /// No resolver for the link's host.
    Unsupported,
    /// Supported host, but nothing to download.
    NoImages,
    Failed(ResolveError),
}

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub discovered: usize,
    /// Images that entered the download stage.
    pub resolved_images: usize,
    pub unsupported: usize,
    pub unresolved: usize,
    pub resolve_failures: usize,
    pub download_failures: usize,
    pub rejections: usize,
    pub accepted: usize,
    pub cache: CacheStats,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.discovered += other.discovered;
        self.resolved_images += other.resolved_images;
        self.unsupported += other.unsupported;
        self.unresolved += other.unresolved;
        self.resolve_failures += other.resolve_failures;
        self.download_failures += other.download_failures;
        self.rejections += other.rejections;
        self.accepted += other.accepted;
        self.cache.hits += other.cache.hits;
        self.cache.downloads += other.cache.downloads;
    }
}

/// Result of a full run.
#[derive(Debug)]
pub struct PipelineResult {
    pub accepted: SceneCollection,
    pub stats: RunStats,
}

/// Result of a resolve-only pass.
#[derive(Debug)]
pub struct ResolveReport {
    pub resolved: Vec<ResolvedPost>,
    pub stats: RunStats,
}

/// Per-post partial result, merged after the parallel pass.
struct PostReport<T> {
    items: Vec<T>,
    stats: RunStats,
}

fn emit(events: Option<&Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        // Printer may have gone away; progress output is best effort
        let _ = tx.send(event);
    }
}

pub struct Pipeline {
    registry: ResolverRegistry,
    transport: Arc<dyn Transport>,
    cache: DownloadCache,
    fetcher: Fetcher,
    processor: Processor,
    fan_out: FanOut,
}

impl Pipeline {
    pub fn new(
        registry: ResolverRegistry,
        transport: Arc<dyn Transport>,
        cache: DownloadCache,
        processor: Processor,
        fan_out: FanOut,
    ) -> Self {
        let fetcher = Fetcher::new(Arc::clone(&transport));
        Self {
            registry,
            transport,
            cache,
            fetcher,
            processor,
            fan_out,
        }
    }

    /// Discovered → Resolved | Unsupported | NoImages | Failed.
    pub fn resolve_post(&self, post: &Post) -> Resolution {
        if !self.registry.supports(&post.url) {
            return Resolution::Unsupported;
        }
        let urls = match self.registry.resolve(&post.url, self.transport.as_ref()) {
            Ok(urls) => urls,
            Err(e) => return Resolution::Failed(e),
        };
        let keep = match self.fan_out {
            FanOut::All => urls.len(),
            FanOut::First => 1,
        };
        let resolved: Vec<ResolvedPost> = urls
            .into_iter()
            .take(keep)
            .map(|image_url| ResolvedPost {
                post: post.source_only(),
                image_url,
            })
            .collect();
        if resolved.is_empty() {
            Resolution::NoImages
        } else {
            Resolution::Resolved(resolved)
        }
    }

    /// Resolved → Downloaded, through the cache.
    pub fn download(&self, resolved: &ResolvedPost) -> Result<DownloadedPost, FetchError> {
        let (path, status) = self.cache.fetch(&resolved.image_url, &self.fetcher)?;
        Ok(DownloadedPost {
            resolved: resolved.clone(),
            path,
            status,
        })
    }

    /// Downloaded → Processed.
    pub fn process(&self, downloaded: &DownloadedPost) -> Result<ProcessedPost, ProcessError> {
        let dimensions = self.processor.process(&downloaded.path)?;
        Ok(ProcessedPost {
            resolved: downloaded.resolved.clone(),
            file: downloaded.file_name(),
            dimensions,
        })
    }

    /// Resolve every post without downloading anything.
    pub fn resolve_all(
        &self,
        discovered: &SceneCollection,
        events: Option<Sender<PipelineEvent>>,
    ) -> ResolveReport {
        let reports: Vec<PostReport<ResolvedPost>> = discovered
            .scenes
            .par_iter()
            .enumerate()
            .map(|(i, post)| {
                let mut stats = RunStats {
                    discovered: 1,
                    ..RunStats::default()
                };
                let items = self.resolve_stage(i + 1, post, events.as_ref(), &mut stats);
                PostReport { items, stats }
            })
            .collect();

        let mut resolved = Vec::new();
        let mut stats = RunStats::default();
        for report in reports {
            resolved.extend(report.items);
            stats.merge(&report.stats);
        }
        ResolveReport { resolved, stats }
    }

    /// Run every post through all stages and return the accepted set.
    pub fn run(
        &self,
        discovered: &SceneCollection,
        events: Option<Sender<PipelineEvent>>,
    ) -> PipelineResult {
        let reports: Vec<PostReport<Post>> = discovered
            .scenes
            .par_iter()
            .enumerate()
            .map(|(i, post)| self.run_post(i + 1, post, events.as_ref()))
            .collect();

        let mut accepted = Vec::new();
        let mut stats = RunStats::default();
        for report in reports {
            accepted.extend(report.items);
            stats.merge(&report.stats);
        }
        info!(
            discovered = stats.discovered,
            accepted = stats.accepted,
            "pipeline finished"
        );
        PipelineResult {
            accepted: SceneCollection::new(accepted),
            stats,
        }
    }

    fn resolve_stage(
        &self,
        index: usize,
        post: &Post,
        events: Option<&Sender<PipelineEvent>>,
        stats: &mut RunStats,
    ) -> Vec<ResolvedPost> {
        let host = post.host();
        match self.resolve_post(post) {
            Resolution::Resolved(resolved) => {
                debug!(%host, score = post.score, images = resolved.len(), "resolved");
                stats.resolved_images += resolved.len();
                emit(
                    events,
                    PipelineEvent::Resolved {
                        index,
                        post: post.clone(),
                        images: resolved.len(),
                    },
                );
                resolved
            }
            Resolution::Unsupported => {
                info!(%host, score = post.score, title = %post.title, "unsupported host");
                stats.unsupported += 1;
                emit(
                    events,
                    PipelineEvent::Unsupported {
                        index,
                        post: post.clone(),
                    },
                );
                Vec::new()
            }
            Resolution::NoImages => {
                info!(%host, score = post.score, title = %post.title, "no images found");
                stats.unresolved += 1;
                emit(
                    events,
                    PipelineEvent::NoImages {
                        index,
                        post: post.clone(),
                    },
                );
                Vec::new()
            }
            Resolution::Failed(e) => {
                warn!(%host, score = post.score, title = %post.title, error = %e, "resolve failed");
                stats.resolve_failures += 1;
                emit(
                    events,
                    PipelineEvent::ResolveFailed {
                        index,
                        post: post.clone(),
                        error: e.to_string(),
                    },
                );
                Vec::new()
            }
        }
    }

    fn run_post(
        &self,
        index: usize,
        post: &Post,
        events: Option<&Sender<PipelineEvent>>,
    ) -> PostReport<Post> {
        let mut report = PostReport {
            items: Vec::new(),
            stats: RunStats {
                discovered: 1,
                ..RunStats::default()
            },
        };
        let host = post.host();

        for resolved in self.resolve_stage(index, post, events, &mut report.stats) {
            let downloaded = match self.download(&resolved) {
                Ok(d) => d,
                Err(e) => {
                    warn!(
                        %host,
                        score = post.score,
                        title = %post.title,
                        url = %resolved.image_url,
                        error = %e,
                        "download failed"
                    );
                    report.stats.download_failures += 1;
                    emit(
                        events,
                        PipelineEvent::DownloadFailed {
                            index,
                            post: post.clone(),
                            image_url: resolved.image_url,
                            error: e.to_string(),
                        },
                    );
                    continue;
                }
            };
            report.stats.cache.record(downloaded.status);
            emit(
                events,
                PipelineEvent::Downloaded {
                    index,
                    post: post.clone(),
                    file: downloaded.file_name(),
                    status: downloaded.status,
                },
            );

            match self.process(&downloaded) {
                Ok(processed) => {
                    let accepted = Post::from(processed);
                    report.stats.accepted += 1;
                    emit(
                        events,
                        PipelineEvent::Accepted {
                            index,
                            post: accepted.clone(),
                        },
                    );
                    report.items.push(accepted);
                }
                Err(e) => {
                    warn!(
                        %host,
                        score = post.score,
                        title = %post.title,
                        file = %downloaded.path.display(),
                        error = %e,
                        "image rejected"
                    );
                    report.stats.rejections += 1;
                    emit(
                        events,
                        PipelineEvent::Rejected {
                            index,
                            post: post.clone(),
                            file: downloaded.file_name(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
        report
    }
}
