use crate::ArchiveError;
use std::io::{self, Read};
use tarpull_schema::{Digest, Hasher};

/// Reader that yields exactly `expected` bytes of `inner`, hashing them when
/// a digest is supplied.
///
/// A body that ends early fails the read with `UnexpectedEof`; the shortfall
/// is kept so the caller can report it once the archive writer gives up.
/// [`finish`](Self::finish) then rejects trailing bytes and digest mismatches.
pub struct VerifyingReader<R> {
    inner: R,
    expected: u64,
    read: u64,
    hasher: Option<(Hasher, Digest)>,
    short: bool,
}

impl<R: Read> VerifyingReader<R> {
    pub fn new(inner: R, expected: u64, digest: Option<&Digest>) -> Self {
        Self {
            inner,
            expected,
            read: 0,
            hasher: digest.map(|d| (Hasher::new(d.algorithm()), d.clone())),
            short: false,
        }
    }

    /// Whether the body ended before `expected` bytes.
    pub fn was_short(&self) -> bool {
        self.short
    }

    /// Check that nothing follows the expected bytes and that the digest holds.
    pub fn finish(mut self, path: &str) -> Result<u64, ArchiveError> {
        if self.read < self.expected || self.short {
            return Err(ArchiveError::SizeMismatch {
                path: path.to_owned(),
                expected: self.expected,
                actual: self.read,
            });
        }
        let mut probe = [0u8; 1];
        if self.inner.read(&mut probe)? != 0 {
            let mut rest = Vec::new();
            let extra = self.inner.read_to_end(&mut rest)? as u64 + 1;
            return Err(ArchiveError::SizeMismatch {
                path: path.to_owned(),
                expected: self.expected,
                actual: self.expected + extra,
            });
        }
        if let Some((hasher, expected)) = self.hasher {
            let actual = hasher.finish();
            if actual != expected {
                return Err(ArchiveError::DigestMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(self.read)
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.expected - self.read;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            self.short = true;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {} of {} bytes", self.read, self.expected),
            ));
        }
        if let Some((hasher, _)) = &mut self.hasher {
            hasher.update(&buf[..n]);
        }
        self.read += n as u64;
        Ok(n)
    }
}
