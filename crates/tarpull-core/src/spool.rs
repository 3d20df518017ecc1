//! Parallel blob fetch into anonymous temp files.
//!
//! Blobs are fetched in windows of at most `jobs`. Every blob of a window is
//! downloaded and verified by its own thread, then the window is committed to
//! the archive in input order before the next window starts. At most `jobs`
//! spooled blobs exist at any time and the archive only ever sees one writer.

use crate::streamer::member_size;
use crate::CoreError;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use tarpull_archive::{blob_path, ArchiveWriter, BlobWrite, VerifyingReader};
use tarpull_registry::RegistrySource;
use tarpull_schema::Descriptor;
use tracing::debug;

/// A fully downloaded blob waiting for its turn in the archive.
pub struct SpooledBlob {
    pub descriptor: Descriptor,
    pub size: u64,
    file: File,
}

impl SpooledBlob {
    /// Commit to the archive.
    pub fn commit(mut self, archive: &mut ArchiveWriter) -> Result<BlobWrite, CoreError> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(archive.write_blob(&self.descriptor.digest, self.size, self.file)?)
    }
}

/// Download one blob into an anonymous temp file, checking size and digest.
pub fn spool_blob(
    source: &dyn RegistrySource,
    repository: &str,
    descriptor: &Descriptor,
    verify: bool,
) -> Result<SpooledBlob, CoreError> {
    let digest = &descriptor.digest;
    let blob = source.fetch_blob(repository, digest)?;
    let size = member_size(descriptor, blob.content_length, verify)?;

    let mut file = tempfile::tempfile()?;
    let mut body = VerifyingReader::new(blob.reader, size, verify.then_some(digest));
    let path = blob_path(digest);
    if let Err(e) = std::io::copy(&mut body, &mut file) {
        if body.was_short() {
            body.finish(&path)?;
        }
        return Err(CoreError::Io(e));
    }
    body.finish(&path)?;
    debug!("spooled {digest} ({size} bytes)");

    Ok(SpooledBlob {
        descriptor: descriptor.clone(),
        size,
        file,
    })
}

/// Fetch `descriptors` with up to `jobs` threads and write them to the
/// archive in the given order.
///
/// Blobs the archive already holds, and repeats within `descriptors`, are not
/// fetched when deduplication is on. `interrupted` is polled between windows.
pub fn fetch_parallel(
    source: &dyn RegistrySource,
    repository: &str,
    descriptors: &[Descriptor],
    archive: &mut ArchiveWriter,
    jobs: usize,
    verify: bool,
    interrupted: &dyn Fn() -> bool,
) -> Result<Vec<BlobWrite>, CoreError> {
    let jobs = jobs.max(1);
    let mut results = vec![BlobWrite::Skipped; descriptors.len()];

    // Plan: indices that need a download.
    let mut pending = Vec::new();
    for (idx, d) in descriptors.iter().enumerate() {
        let repeat = descriptors[..idx].iter().any(|p| p.digest == d.digest);
        if archive.contains(&d.digest) || (repeat && archive.dedups()) {
            continue;
        }
        pending.push(idx);
    }

    for window in pending.chunks(jobs) {
        if interrupted() {
            return Err(CoreError::Interrupted);
        }
        let spooled: Vec<Result<SpooledBlob, CoreError>> = std::thread::scope(|s| {
            let handles: Vec<_> = window
                .iter()
                .map(|&idx| {
                    let d = &descriptors[idx];
                    s.spawn(move || spool_blob(source, repository, d, verify))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(Err(CoreError::WorkerPanicked)))
                .collect()
        });

        for (&idx, blob) in window.iter().zip(spooled) {
            results[idx] = blob?.commit(archive)?;
        }
    }

    // Anything not downloaded counts as a skip, like the sequential path.
    for (idx, r) in results.iter().enumerate() {
        if *r == BlobWrite::Skipped && !pending.contains(&idx) {
            archive.note_skipped();
        }
    }
    Ok(results)
}
