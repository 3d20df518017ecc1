use serde::Serialize;
use std::path::PathBuf;
use tarpull_archive::ArchiveStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Ok,
    Failed,
}

/// What happened to one line of the image list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOutcome {
    pub image: String,
    pub status: ImageStatus,
    /// Catalog entries recorded for this line (more than one when several
    /// manifest-list entries matched).
    pub manifests: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageOutcome {
    pub fn ok(image: String, manifests: usize) -> Self {
        Self {
            image,
            status: ImageStatus::Ok,
            manifests,
            error: None,
        }
    }

    pub fn failed(image: String, manifests: usize, error: String) -> Self {
        Self {
            image,
            status: ImageStatus::Failed,
            manifests,
            error: Some(error),
        }
    }
}

/// Summary of a finished bundle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    pub output: PathBuf,
    pub images: Vec<ImageOutcome>,
    pub blobs_written: usize,
    pub blobs_skipped: usize,
    pub bytes_written: u64,
}

impl BundleReport {
    pub(crate) fn new(output: PathBuf, images: Vec<ImageOutcome>, stats: ArchiveStats) -> Self {
        Self {
            output,
            images,
            blobs_written: stats.blobs_written,
            blobs_skipped: stats.blobs_skipped,
            bytes_written: stats.bytes_written,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &ImageOutcome> {
        self.images
            .iter()
            .filter(|i| i.status == ImageStatus::Failed)
    }

    /// True when every image made it into the archive.
    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Number of catalog entries in the archive.
    pub fn catalog_entries(&self) -> usize {
        self.images.iter().map(|i| i.manifests).sum()
    }
}
