use crate::catalog::{CatalogBuilder, FetchPlan};
use crate::concurrency::shutdown_requested;
use crate::report::{BundleReport, ImageOutcome};
use crate::CoreError;
use std::path::Path;
use tarpull_archive::ArchiveWriter;
use tarpull_registry::{resolve, RegistrySource};
use tarpull_schema::{ImageEntry, Platform};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOptions {
    pub platform: Platform,
    /// Blobs fetched concurrently per image; 1 streams straight from the
    /// response into the archive.
    pub jobs: usize,
    /// Record a failed image and continue instead of aborting the run.
    pub keep_going: bool,
    pub dedup: bool,
    pub verify_digests: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            jobs: 1,
            keep_going: false,
            dedup: true,
            verify_digests: true,
        }
    }
}

type ImageHook<'a> = Box<dyn FnMut(&ImageEntry, usize, usize) + 'a>;

/// Drives an ordered image list into one archive.
///
/// Images are processed in list order and the archive is only moved onto the
/// output path once every image is in (or, with `keep_going`, accounted for).
pub struct Bundler<'a> {
    source: &'a dyn RegistrySource,
    options: BundleOptions,
    interrupted: Box<dyn Fn() -> bool + 'a>,
    on_image: Option<ImageHook<'a>>,
}

impl<'a> Bundler<'a> {
    pub fn new(source: &'a dyn RegistrySource, options: BundleOptions) -> Self {
        Self {
            source,
            options,
            interrupted: Box::new(shutdown_requested),
            on_image: None,
        }
    }

    /// Replace the Ctrl-C check polled between blobs.
    #[must_use]
    pub fn with_interrupt(mut self, check: impl Fn() -> bool + 'a) -> Self {
        self.interrupted = Box::new(check);
        self
    }

    /// Called before each image with its 1-based position and the total.
    #[must_use]
    pub fn on_image(mut self, hook: impl FnMut(&ImageEntry, usize, usize) + 'a) -> Self {
        self.on_image = Some(Box::new(hook));
        self
    }

    /// Pull every entry into a new archive at `output`.
    pub fn run(
        &mut self,
        entries: &[ImageEntry],
        output: &Path,
    ) -> Result<BundleReport, CoreError> {
        let mut archive = ArchiveWriter::create(
            output,
            self.options.dedup,
            self.options.verify_digests,
        )?;
        let mut catalog = CatalogBuilder::new();
        let mut outcomes = Vec::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            if (self.interrupted)() {
                archive.abort();
                return Err(CoreError::Interrupted);
            }
            if let Some(hook) = self.on_image.as_mut() {
                hook(entry, i + 1, entries.len());
            }
            info!("pulling {entry} ({}/{})", i + 1, entries.len());

            let before = catalog.catalog().len();
            match self.pull_image(entry, &mut archive, &mut catalog) {
                Ok(manifests) => outcomes.push(ImageOutcome::ok(entry.repo_tag(), manifests)),
                Err(e) if self.isolate(&e, &archive) => {
                    warn!("skipping {entry}: {e}");
                    let recorded = catalog.catalog().len() - before;
                    outcomes.push(ImageOutcome::failed(entry.repo_tag(), recorded, e.to_string()));
                }
                Err(e) => {
                    archive.abort();
                    return Err(e);
                }
            }
        }

        if !outcomes.is_empty() && catalog.catalog().is_empty() {
            archive.abort();
            return Err(CoreError::NothingBundled(outcomes.len()));
        }

        let stats = archive.finalize(catalog.catalog())?;
        Ok(BundleReport::new(output.to_path_buf(), outcomes, stats))
    }

    fn isolate(&self, err: &CoreError, archive: &ArchiveWriter) -> bool {
        self.options.keep_going
            && !archive.is_poisoned()
            && !matches!(err, CoreError::Interrupted | CoreError::WorkerPanicked)
    }

    fn pull_image(
        &self,
        entry: &ImageEntry,
        archive: &mut ArchiveWriter,
        catalog: &mut CatalogBuilder,
    ) -> Result<usize, CoreError> {
        let resolved = resolve(
            self.source,
            &entry.repository,
            &entry.tag,
            &self.options.platform,
        )?;
        let plan = FetchPlan {
            jobs: self.options.jobs,
            verify: self.options.verify_digests,
            interrupted: &*self.interrupted,
        };
        for image in &resolved {
            let recorded = catalog.record_image(
                self.source,
                archive,
                &entry.repository,
                &entry.tag,
                &image.manifest,
                plan,
            )?;
            match &image.platform {
                Some(p) => info!("{entry}: {p}, {} layers", recorded.layers.len()),
                None => info!("{entry}: {} layers", recorded.layers.len()),
            }
        }
        Ok(resolved.len())
    }
}

/// Pull `entries` from `source` into a new archive at `output`.
pub fn bundle(
    source: &dyn RegistrySource,
    entries: &[ImageEntry],
    output: &Path,
    options: BundleOptions,
) -> Result<BundleReport, CoreError> {
    Bundler::new(source, options).run(entries, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let o = BundleOptions::default();
        assert_eq!(o.platform.to_string(), "linux/amd64");
        assert_eq!(o.jobs, 1);
        assert!(!o.keep_going);
        assert!(o.dedup);
        assert!(o.verify_digests);
    }
}
