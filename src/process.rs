//! Stereo image validation.
//!
//! Stage 4 of the crawl pipeline. Takes a downloaded file and decides whether
//! it is a usable side-by-side stereo pair, returning its dimensions on
//! success and a human-readable reason on rejection.
//!
//! ## Policy
//!
//! ```text
//! width, height   > 0
//! width           >= min_width          (default 200)
//! width / height  in [min_aspect_ratio, max_aspect_ratio]   (default 1.2 – 4.0)
//! ```
//!
//! A cross-view pair is two frames next to each other, so a usable image is
//! clearly wider than tall. Very wide strips (panoramas, comics) fall outside
//! the upper bound.
//!
//! ## Decoding
//!
//! With `full_decode` (the default) every pixel is decoded, so a truncated
//! download is rejected here instead of surfacing later. Without it only the
//! header is read.
//!
//! ## Timeouts
//!
//! Each call runs on its own thread and is abandoned after `timeout`. A
//! pathological file therefore costs one rejection, not a stuck worker.

use crate::config::CrawlerConfig;
use crate::imaging::{BackendError, Dimensions, ImageBackend};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("image unreadable: {0}")]
    Backend(#[from] BackendError),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("gave up after {0:?}")]
    TimedOut(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation worker stopped without a result")]
    WorkerLost,
}

/// Acceptance policy for downloaded images.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub min_width: u32,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub full_decode: bool,
    pub timeout: Duration,
}

impl ProcessConfig {
    /// Build a ProcessConfig from CrawlerConfig values.
    pub fn from_crawler_config(config: &CrawlerConfig) -> Self {
        let p = &config.processing;
        Self {
            min_width: p.min_width,
            min_aspect_ratio: p.min_aspect_ratio,
            max_aspect_ratio: p.max_aspect_ratio,
            full_decode: p.full_decode,
            timeout: Duration::from_secs(p.timeout_secs),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_crawler_config(&CrawlerConfig::default())
    }
}

/// Check dimensions against the policy. `Err` carries the rejection reason.
pub fn check_shape(dims: Dimensions, config: &ProcessConfig) -> Result<(), String> {
    if dims.width == 0 || dims.height == 0 {
        return Err(format!("empty image ({}x{})", dims.width, dims.height));
    }
    if dims.width < config.min_width {
        return Err(format!(
            "too narrow: {}px wide, need at least {}px",
            dims.width, config.min_width
        ));
    }
    let ratio = dims.aspect_ratio();
    if ratio < config.min_aspect_ratio || ratio > config.max_aspect_ratio {
        return Err(format!(
            "aspect ratio {:.2} outside {:.2}..{:.2}",
            ratio, config.min_aspect_ratio, config.max_aspect_ratio
        ));
    }
    Ok(())
}

/// Validates downloaded files through an [`ImageBackend`].
#[derive(Clone)]
pub struct Processor {
    backend: Arc<dyn ImageBackend>,
    config: ProcessConfig,
}

impl Processor {
    pub fn new(backend: Arc<dyn ImageBackend>, config: ProcessConfig) -> Self {
        Self { backend, config }
    }

    /// Inspect `path` and return its dimensions if it passes the policy.
    pub fn process(&self, path: &Path) -> Result<Dimensions, ProcessError> {
        let dims = self.inspect_with_timeout(path)?;
        check_shape(dims, &self.config).map_err(ProcessError::Rejected)?;
        Ok(dims)
    }

    fn inspect_with_timeout(&self, path: &Path) -> Result<Dimensions, ProcessError> {
        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let full_decode = self.config.full_decode;
        let owned = path.to_path_buf();

        std::thread::Builder::new()
            .name("image-check".into())
            .spawn(move || {
                let result = if full_decode {
                    backend.verify(&owned)
                } else {
                    backend.identify(&owned)
                };
                // Receiver may be gone after a timeout
                let _ = tx.send(result);
            })?;

        match rx.recv_timeout(self.config.timeout) {
            Ok(result) => Ok(result?),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(ProcessError::TimedOut(self.config.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ProcessError::WorkerLost),
        }
    }
}
