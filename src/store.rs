//! JSON snapshots of post collections.
//!
//! A snapshot is a single `{"scenes": [...]}` document. The crawler keeps two:
//! the discovered set (resume point for later runs) and the accepted set
//! (final output). Saves go through a temp file in the target directory that
//! is synced and renamed over the old snapshot, so the file on disk is always
//! either the previous complete document or the new one.

use crate::types::SceneCollection;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot {path} not found (run with --fresh to discover posts first)")]
    NotFound { path: PathBuf },
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct PostStore {
    path: PathBuf,
}

impl PostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write `collection` atomically, creating the parent directory if needed.
    pub fn save(&self, collection: &SceneCollection) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".snapshot.")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, collection).map_err(|source| {
                StoreError::Json {
                    path: self.path.clone(),
                    source,
                }
            })?;
            writer.write_all(b"\n").map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(path = %self.path.display(), scenes = collection.len(), "snapshot saved");
        Ok(())
    }

    /// Read the snapshot. A missing or malformed file is an error.
    pub fn load(&self) -> Result<SceneCollection, StoreError> {
        let file = std::fs::File::open(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                StoreError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }
}
