use tarpull_schema::Digest;

/// Name of the top-level index member.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Archive-relative path of a blob, `blobs/<algorithm>/<hex>`.
///
/// `Digest` parsing already rejects anything but lowercase hex, so the result
/// never escapes the `blobs/` directory.
#[inline]
pub fn blob_path(digest: &Digest) -> String {
    format!("blobs/{}/{}", digest.algorithm(), digest.hex())
}
