//! Output archive for a bundle of container images.
//!
//! This crate provides the archive layer: `ArchiveWriter`, the single
//! sequential writer over a `tar::Builder` that lands atomically on the output
//! path, the `Catalog` written last as `manifest.json`, content-addressed blob
//! paths, and the size- and digest-checking reader blobs are streamed through.

pub mod catalog;
pub mod layout;
pub mod verify;
pub mod writer;

pub use catalog::{Catalog, CatalogEntry, LayerSource};
pub use layout::{blob_path, MANIFEST_NAME};
pub use verify::VerifyingReader;
pub use writer::{ArchiveStats, ArchiveWriter, BlobWrite};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so a preceding rename into it survives a crash.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot create archive at {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("archive is unusable after a failed member write")]
    Poisoned,
    #[error("size mismatch for '{path}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("'{0}' is written by finalize")]
    ReservedName(String),
    #[error("catalog references '{0}' which was never written")]
    MissingBlob(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
