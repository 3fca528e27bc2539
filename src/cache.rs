//! Download cache for resumable runs.
//!
//! Downloading is the slow part of a run and the content behind an image URL
//! doesn't change, so every resolved URL maps to one deterministic file in the
//! download directory. A later run that finds the file skips the network.
//!
//! # Design
//!
//! ## File names
//!
//! The cache file is named after the URL's host and path
//! (`https://i.redd.it/k3x9.jpg` → `i.redd.it_k3x9.jpg`), sanitized to
//! `[A-Za-z0-9._-]`. Two hosts serving the same file name get two files.
//! URLs without a usable final segment fall back to the first 16 hex
//! characters of the URL's SHA-256 plus `.img`. Names are readable in a file
//! browser and stable across runs.
//!
//! ## Hits
//!
//! A hit is an existing, non-empty regular file. The [`Fetcher`] only ever
//! renames complete transfers into place, so a file at the target path is
//! always a finished download; a crash mid-transfer leaves only a hidden
//! `.part` file that never matches.
//!
//! ## Concurrency
//!
//! Two posts may resolve to the same image URL. [`DownloadCache::fetch`]
//! takes a per-path lock around check-then-download, so the second caller
//! waits and then sees a hit instead of racing the first transfer.
//!
//! [`Fetcher`]: crate::fetch::Fetcher

use crate::fetch::{FetchError, Fetcher};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Extension used when the URL gives no file name.
const FALLBACK_EXTENSION: &str = "img";

/// How a download request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// File was already on disk.
    Hit,
    /// File was transferred in this run.
    Fetched,
}

/// Deterministic cache file name for an image URL.
pub fn cache_file_name(image_url: &str) -> String {
    let name = url::Url::parse(image_url).ok().and_then(|u| {
        let host = u.host_str()?.to_ascii_lowercase();
        let segments: Vec<&str> = u.path_segments()?.filter(|s| !s.is_empty()).collect();
        let last = segments.last()?;
        if sanitize(last).trim_matches('.').is_empty() {
            return None;
        }
        let mut parts = vec![host.as_str()];
        parts.extend(segments.iter().copied());
        Some(sanitize(&parts.join("_")))
    });

    match name {
        Some(name) => name,
        None => {
            let digest = Sha256::digest(image_url.as_bytes());
            let hex = format!("{:x}", digest);
            format!("{}.{}", &hex[..16], FALLBACK_EXTENSION)
        }
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Local image store keyed by URL.
pub struct DownloadCache {
    dir: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DownloadCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Where the image for `image_url` lives (whether or not it exists yet).
    pub fn path_for(&self, image_url: &str) -> PathBuf {
        self.dir.join(cache_file_name(image_url))
    }

    /// Whether `path` holds a finished download.
    pub fn is_cached(&self, path: &Path) -> bool {
        std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    /// The lock guarding `path`. Every caller for the same path gets the same
    /// mutex.
    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Ensure the image for `image_url` is on disk, downloading it on a miss.
    pub fn fetch(
        &self,
        image_url: &str,
        fetcher: &Fetcher,
    ) -> Result<(PathBuf, CacheStatus), FetchError> {
        let path = self.path_for(image_url);
        let lock = self.lock_for(&path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        if self.is_cached(&path) {
            debug!(url = image_url, path = %path.display(), "cache hit");
            return Ok((path, CacheStatus::Hit));
        }
        std::fs::create_dir_all(&self.dir)?;
        fetcher.fetch_to(image_url, &path)?;
        Ok((path, CacheStatus::Fetched))
    }
}

/// Summary of cache performance for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub downloads: u32,
}

impl CacheStats {
    pub fn record(&mut self, status: CacheStatus) {
        match status {
            CacheStatus::Hit => self.hits += 1,
            CacheStatus::Fetched => self.downloads += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.hits + self.downloads
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} downloaded ({} total)",
                self.hits,
                self.downloads,
                self.total()
            )
        } else {
            write!(f, "{} downloaded", self.downloads)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockTransport;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    // =========================================================================
    // File naming
    // =========================================================================

    #[test]
    fn name_is_host_and_path() {
        assert_eq!(
            cache_file_name("https://i.redd.it/k3x9.jpg"),
            "i.redd.it_k3x9.jpg"
        );
        assert_eq!(
            cache_file_name("https://I.Imgur.com/AbC12.png?maxwidth=640"),
            "i.imgur.com_AbC12.png"
        );
    }

    #[test]
    fn name_is_sanitized() {
        assert_eq!(
            cache_file_name("https://example.com/a/my%20photo(1).jpg"),
            "example.com_a_my_20photo_1_.jpg"
        );
    }

    #[test]
    fn name_falls_back_to_hash() {
        let name = cache_file_name("https://example.com/");
        assert!(name.ends_with(".img"));
        assert_eq!(name.len(), 16 + ".img".len());
        // Deterministic
        assert_eq!(name, cache_file_name("https://example.com/"));
        assert_ne!(name, cache_file_name("https://example.org/"));
    }

    #[test]
    fn same_file_name_on_different_hosts_differs() {
        assert_ne!(
            cache_file_name("https://i.redd.it/same.jpg"),
            cache_file_name("https://i.imgur.com/same.jpg")
        );
        assert_ne!(
            cache_file_name("https://example.com/a/x.jpg"),
            cache_file_name("https://example.com/b/x.jpg")
        );
    }

    #[test]
    fn dot_only_segment_falls_back_to_hash() {
        assert!(cache_file_name("https://example.com/..").ends_with(".img"));
    }

    // =========================================================================
    // Hit detection
    // =========================================================================

    #[test]
    fn empty_file_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path());
        let path = cache.path_for("https://i.redd.it/e.jpg");
        fs::write(&path, b"").unwrap();
        assert!(!cache.is_cached(&path));
        fs::write(&path, b"data").unwrap();
        assert!(cache.is_cached(&path));
    }

    #[test]
    fn directory_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path());
        let path = tmp.path().join("d.jpg");
        fs::create_dir(&path).unwrap();
        assert!(!cache.is_cached(&path));
    }

    // =========================================================================
    // fetch
    // =========================================================================

    #[test]
    fn second_fetch_is_a_hit_without_transfer() {
        let tmp = TempDir::new().unwrap();
        let url = "https://i.redd.it/k3x9.jpg";
        let transport = Arc::new(MockTransport::new().with_body(url, b"jpeg bytes".to_vec()));
        let fetcher = Fetcher::new(transport.clone());
        let cache = DownloadCache::new(tmp.path().join("drop"));

        let (path, first) = cache.fetch(url, &fetcher).unwrap();
        let bytes_first = fs::read(&path).unwrap();
        let (path_again, second) = cache.fetch(url, &fetcher).unwrap();

        assert_eq!(first, CacheStatus::Fetched);
        assert_eq!(second, CacheStatus::Hit);
        assert_eq!(path, path_again);
        assert_eq!(fs::read(&path_again).unwrap(), bytes_first);
        assert_eq!(transport.download_count(url), 1);
    }

    #[test]
    fn failed_fetch_leaves_nothing_cached() {
        let tmp = TempDir::new().unwrap();
        let url = "https://i.redd.it/gone.jpg";
        let transport = Arc::new(MockTransport::new().with_status(url, 500));
        let fetcher = Fetcher::new(transport.clone());
        let cache = DownloadCache::new(tmp.path());

        assert!(cache.fetch(url, &fetcher).is_err());
        assert!(!cache.path_for(url).exists());
        // Retry goes back to the network
        assert!(cache.fetch(url, &fetcher).is_err());
        assert_eq!(transport.download_count(url), 2);
    }

    #[test]
    fn same_file_name_on_two_hosts_keeps_both_images() {
        let tmp = TempDir::new().unwrap();
        let a = "https://i.redd.it/same.jpg";
        let b = "https://i.imgur.com/same.jpg";
        let transport = Arc::new(
            MockTransport::new()
                .with_body(a, b"AAAA".to_vec())
                .with_body(b, b"BBBB".to_vec()),
        );
        let fetcher = Fetcher::new(transport.clone());
        let cache = DownloadCache::new(tmp.path());

        let (path_a, status_a) = cache.fetch(a, &fetcher).unwrap();
        let (path_b, status_b) = cache.fetch(b, &fetcher).unwrap();

        assert_eq!(status_a, CacheStatus::Fetched);
        assert_eq!(status_b, CacheStatus::Fetched);
        assert_ne!(path_a, path_b);
        assert_eq!(fs::read(&path_a).unwrap(), b"AAAA");
        assert_eq!(fs::read(&path_b).unwrap(), b"BBBB");
    }

    #[test]
    fn concurrent_fetches_of_one_url_download_once() {
        let tmp = TempDir::new().unwrap();
        let url = "https://i.redd.it/same.jpg";
        let transport = Arc::new(MockTransport::new().with_body(url, b"first".to_vec()));
        let fetcher = Fetcher::new(transport.clone());
        let cache = DownloadCache::new(tmp.path());

        let statuses: Vec<CacheStatus> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let cache = &cache;
                    let fetcher = &fetcher;
                    s.spawn(move || cache.fetch(url, fetcher).unwrap().1)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(
            statuses.iter().filter(|s| **s == CacheStatus::Fetched).count(),
            1
        );
        assert_eq!(
            statuses.iter().filter(|s| **s == CacheStatus::Hit).count(),
            1
        );
        assert_eq!(transport.download_count(url), 1);
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let mut s = CacheStats::default();
        s.record(CacheStatus::Hit);
        s.record(CacheStatus::Hit);
        s.record(CacheStatus::Fetched);
        assert_eq!(format!("{}", s), "2 cached, 1 downloaded (3 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let mut s = CacheStats::default();
        s.record(CacheStatus::Fetched);
        assert_eq!(format!("{}", s), "1 downloaded");
    }
}
