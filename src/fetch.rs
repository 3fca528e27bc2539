//! Atomic image downloads.
//!
//! A transfer streams into a hidden temp file (`.<name>.XXXX.part`) in the
//! destination directory and is renamed onto the target only after the body
//! is complete and synced. Readers of the target path never observe a
//! partial file, and an interrupted transfer leaves the target untouched.

use crate::http::{HttpError, Transport};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} returned an empty body")]
    Empty(String),
}

/// Downloads URLs to files through a [`Transport`].
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Download `url` to `dest`, replacing it atomically. Returns bytes written.
    pub fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let prefix = format!(
            ".{}.",
            dest.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".part")
            .tempfile_in(dir)?;

        let bytes = self.transport.download(url, temp.as_file_mut())?;
        if bytes == 0 {
            // Dropping the temp file removes it
            return Err(FetchError::Empty(url.to_string()));
        }
        temp.as_file_mut().flush()?;
        temp.as_file().sync_all()?;
        temp.persist(dest).map_err(|e| FetchError::Io(e.error))?;

        debug!(url, path = %dest.display(), bytes, "downloaded");
        Ok(bytes)
    }
}
