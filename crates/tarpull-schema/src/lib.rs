//! Document model for registry pulls.
//!
//! This crate defines the schema layer: content digests (`Digest`), the manifest
//! media types a registry may answer with, image manifests and manifest lists
//! (`ImageManifest`, `ManifestList`), target platforms, and the newline-delimited
//! `repository:tag` image list that drives a pull.

pub mod digest;
pub mod entry;
pub mod manifest;
pub mod media;
pub mod platform;

pub use digest::{Digest, DigestAlgorithm, Hasher};
pub use entry::{parse_image_list, read_image_list, ImageEntry};
pub use manifest::{
    parse_manifest, Descriptor, ImageManifest, ManifestDocument, ManifestList, ManifestListEntry,
};
pub use media::{classify, normalize_content_type, ManifestKind, MANIFEST_ACCEPT};
pub use platform::Platform;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read image list: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid image list entry on line {line}: '{entry}', expected '<repository>:<tag>'")]
    InvalidEntry { line: usize, entry: String },
    #[error("invalid digest '{0}', expected '<algorithm>:<hex>'")]
    InvalidDigest(String),
    #[error("unsupported digest algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("invalid platform '{0}', expected '<os>/<architecture>[/<variant>]'")]
    InvalidPlatform(String),
    #[error("unsupported manifest media type '{0}'")]
    UnsupportedMediaType(String),
    #[error("failed to parse {kind}: {source}")]
    Parse {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_entry_names_line() {
        let e = SchemaError::InvalidEntry {
            line: 7,
            entry: "alpine".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("alpine"));
    }

    #[test]
    fn unsupported_media_type_display() {
        let e = SchemaError::UnsupportedMediaType("text/html".to_owned());
        assert!(e.to_string().contains("text/html"));
    }
}
