use crate::layout::{blob_path, MANIFEST_NAME};
use crate::verify::VerifyingReader;
use crate::{fsync_dir, ArchiveError, Catalog};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use tarpull_schema::Digest;
use tempfile::NamedTempFile;

/// Counters reported once the archive is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub blobs_written: usize,
    pub blobs_skipped: usize,
    pub bytes_written: u64,
}

/// Outcome of a blob write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobWrite {
    Written(u64),
    /// Path already present; nothing was read.
    Skipped,
}

/// Sole owner of the output archive.
///
/// Members are appended strictly one after another. The archive is built in a
/// temporary file next to `dest` and only renamed onto it by
/// [`finalize`](Self::finalize); dropping the writer without finalizing
/// leaves `dest` untouched.
///
/// A member write that fails halfway leaves a header whose body is incomplete.
/// The writer is then poisoned and every later call fails.
pub struct ArchiveWriter {
    builder: tar::Builder<BufWriter<NamedTempFile>>,
    dest: PathBuf,
    written: HashSet<String>,
    dedup: bool,
    verify: bool,
    poisoned: bool,
    stats: ArchiveStats,
}

impl ArchiveWriter {
    pub fn create(dest: &Path, dedup: bool, verify: bool) -> Result<Self, ArchiveError> {
        let dir = parent_dir(dest);
        let tmp = NamedTempFile::new_in(&dir).map_err(|source| ArchiveError::Create {
            path: dest.to_path_buf(),
            source,
        })?;
        tracing::debug!("staging archive at {}", tmp.path().display());
        Ok(Self {
            builder: tar::Builder::new(BufWriter::new(tmp)),
            dest: dest.to_path_buf(),
            written: HashSet::new(),
            dedup,
            verify,
            poisoned: false,
            stats: ArchiveStats::default(),
        })
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn dedups(&self) -> bool {
        self.dedup
    }

    /// Whether a later write of `digest` would be skipped.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.dedup && self.written.contains(&blob_path(digest))
    }

    /// Record a deduplicated blob without touching the archive.
    pub fn note_skipped(&mut self) {
        self.stats.blobs_skipped += 1;
    }

    fn ensure_usable(&self) -> Result<(), ArchiveError> {
        if self.poisoned {
            return Err(ArchiveError::Poisoned);
        }
        Ok(())
    }

    /// Append an arbitrary member of exactly `size` bytes.
    pub fn write_member(
        &mut self,
        name: &str,
        size: u64,
        reader: impl Read,
    ) -> Result<u64, ArchiveError> {
        if name == MANIFEST_NAME {
            return Err(ArchiveError::ReservedName(name.to_owned()));
        }
        self.append(name, size, reader, None)
    }

    /// Append the blob for `digest` at its content-addressed path.
    ///
    /// The body must be exactly `size` bytes; with verification on it must
    /// also hash to `digest`. A path already written is skipped when
    /// deduplication is on.
    pub fn write_blob(
        &mut self,
        digest: &Digest,
        size: u64,
        reader: impl Read,
    ) -> Result<BlobWrite, ArchiveError> {
        self.ensure_usable()?;
        if self.contains(digest) {
            tracing::debug!("skip {digest}: already in archive");
            self.note_skipped();
            return Ok(BlobWrite::Skipped);
        }
        let path = blob_path(digest);
        let expect = if self.verify { Some(digest) } else { None };
        let n = self.append(&path, size, reader, expect)?;
        self.stats.blobs_written += 1;
        Ok(BlobWrite::Written(n))
    }

    fn append(
        &mut self,
        name: &str,
        size: u64,
        reader: impl Read,
        digest: Option<&Digest>,
    ) -> Result<u64, ArchiveError> {
        self.ensure_usable()?;
        let mut body = VerifyingReader::new(reader, size, digest);
        let mut header = member_header(size);

        if let Err(e) = self.builder.append_data(&mut header, name, &mut body) {
            self.poisoned = true;
            if body.was_short() {
                return Err(body.finish(name).err().unwrap_or(ArchiveError::Io(e)));
            }
            return Err(ArchiveError::Io(e));
        }
        let n = body.finish(name).inspect_err(|_| self.poisoned = true)?;

        self.written.insert(name.to_owned());
        self.stats.bytes_written += n;
        tracing::debug!("wrote {name} ({n} bytes)");
        Ok(n)
    }

    /// Write `manifest.json` and move the archive onto its destination.
    ///
    /// Every path the catalog references must already be in the archive.
    pub fn finalize(mut self, catalog: &Catalog) -> Result<ArchiveStats, ArchiveError> {
        self.ensure_usable()?;
        if let Some(missing) = catalog
            .referenced_paths()
            .into_iter()
            .find(|p| !self.written.contains(*p))
        {
            return Err(ArchiveError::MissingBlob(missing.to_owned()));
        }

        let json = catalog.to_json()?;
        let mut header = member_header(json.len() as u64);
        self.builder
            .append_data(&mut header, MANIFEST_NAME, json.as_slice())?;

        let buffered = self.builder.into_inner()?;
        let tmp = buffered.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.dest).map_err(|e| ArchiveError::Io(e.error))?;
        fsync_dir(&parent_dir(&self.dest))?;

        tracing::info!(
            "wrote {} ({} images, {} blobs, {} bytes)",
            self.dest.display(),
            catalog.len(),
            self.stats.blobs_written,
            self.stats.bytes_written
        );
        Ok(self.stats)
    }

    /// Discard the staged archive; the destination is left as it was.
    pub fn abort(self) {
        tracing::debug!("discarding staged archive for {}", self.dest.display());
    }
}

fn member_header(size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
