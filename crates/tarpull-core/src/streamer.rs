use crate::CoreError;
use tarpull_archive::{blob_path, ArchiveError, ArchiveWriter, BlobWrite};
use tarpull_registry::RegistrySource;
use tarpull_schema::Descriptor;
use tracing::{debug, warn};

/// Size to declare for a blob member.
///
/// The response's `Content-Length` wins. When verification is on, it must
/// agree with the manifest descriptor, which is checked before anything is
/// written so a disagreement cannot poison the archive.
pub(crate) fn member_size(
    descriptor: &Descriptor,
    content_length: Option<u64>,
    verify: bool,
) -> Result<u64, ArchiveError> {
    match content_length {
        Some(declared) if declared != descriptor.size => {
            if verify {
                return Err(ArchiveError::SizeMismatch {
                    path: blob_path(&descriptor.digest),
                    expected: descriptor.size,
                    actual: declared,
                });
            }
            warn!(
                "{}: registry declares {declared} bytes, manifest says {}",
                descriptor.digest, descriptor.size
            );
            Ok(declared)
        }
        Some(declared) => Ok(declared),
        None => Ok(descriptor.size),
    }
}

/// Copy one blob from the registry straight into the next archive member.
///
/// The body is never held in memory as a whole. A blob already in the archive
/// is not fetched again.
pub fn stream_blob(
    source: &dyn RegistrySource,
    repository: &str,
    descriptor: &Descriptor,
    archive: &mut ArchiveWriter,
    verify: bool,
) -> Result<BlobWrite, CoreError> {
    let digest = &descriptor.digest;
    if archive.contains(digest) {
        debug!("{digest}: already in archive");
        archive.note_skipped();
        return Ok(BlobWrite::Skipped);
    }

    let blob = source.fetch_blob(repository, digest)?;
    let size = member_size(descriptor, blob.content_length, verify)?;
    debug!("streaming {digest} ({size} bytes)");
    Ok(archive.write_blob(digest, size, blob.reader)?)
}
