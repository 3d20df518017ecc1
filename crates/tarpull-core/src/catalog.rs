use crate::spool::fetch_parallel;
use crate::streamer::stream_blob;
use crate::CoreError;
use tarpull_archive::{ArchiveWriter, BlobWrite, Catalog, CatalogEntry};
use tarpull_registry::RegistrySource;
use tarpull_schema::{Descriptor, ImageManifest};
use tracing::debug;

/// Owns the catalog for one archive and fills it image by image.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

/// How blobs of one image are fetched.
#[derive(Clone, Copy)]
pub struct FetchPlan<'a> {
    pub jobs: usize,
    pub verify: bool,
    pub interrupted: &'a dyn Fn() -> bool,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Write every blob of `manifest` to the archive, then append its entry.
    ///
    /// Layers go first in manifest order, the config last. The entry is only
    /// recorded once all blobs are in, so a failed image leaves no entry.
    pub fn record_image(
        &mut self,
        source: &dyn RegistrySource,
        archive: &mut ArchiveWriter,
        repository: &str,
        tag: &str,
        manifest: &ImageManifest,
        plan: FetchPlan<'_>,
    ) -> Result<&CatalogEntry, CoreError> {
        let mut blobs: Vec<Descriptor> = manifest.layers.clone();
        blobs.push(manifest.config.clone());

        let writes = if plan.jobs > 1 {
            fetch_parallel(
                source,
                repository,
                &blobs,
                archive,
                plan.jobs,
                plan.verify,
                plan.interrupted,
            )?
        } else {
            let mut writes = Vec::with_capacity(blobs.len());
            for (i, blob) in blobs.iter().enumerate() {
                if (plan.interrupted)() {
                    return Err(CoreError::Interrupted);
                }
                debug!(
                    "{repository}:{tag} blob {}/{}: {} ({} bytes)",
                    i + 1,
                    blobs.len(),
                    blob.digest,
                    blob.size
                );
                writes.push(stream_blob(source, repository, blob, archive, plan.verify)?);
            }
            writes
        };

        let written = writes
            .iter()
            .filter(|w| matches!(w, BlobWrite::Written(_)))
            .count();
        debug!(
            "{repository}:{tag}: {written} blobs written, {} already present",
            writes.len() - written
        );

        self.catalog.push(CatalogEntry::from_manifest(
            format!("{repository}:{tag}"),
            manifest,
        ));
        Ok(&self.catalog.entries()[self.catalog.len() - 1])
    }
}
