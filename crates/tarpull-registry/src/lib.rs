//! Read-only access to an OCI/Docker distribution registry.
//!
//! This crate provides the `RegistrySource` abstraction over the `/v2/`
//! manifest and blob endpoints, an HTTP implementation backed by a pooled
//! `ureq` agent, client configuration, and the manifest resolver that turns a
//! `repository:tag` into the platform-specific image manifests to bundle.

pub mod config;
pub mod http;
pub mod resolve;

pub use config::{normalize_registry_url, ClientConfig};
pub use http::HttpRegistry;
pub use resolve::{resolve, ResolvedImage};

use std::io::Read;
use tarpull_schema::{Digest, SchemaError};
use thiserror::Error;

/// Default `User-Agent` sent on every request.
pub const USER_AGENT: &str = concat!("tarpull/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url}: HTTP {status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },
    #[error("not found (404 Not Found): {0}")]
    NotFound(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("no manifest for platform {platform} in {reference}")]
    NoMatchingPlatform { reference: String, platform: String },
    #[error("manifest list entry {0} is itself a manifest list")]
    NestedList(String),
    #[error("manifest {expected} does not match its content digest {actual}")]
    ManifestDigestMismatch { expected: String, actual: String },
    #[error("registry config error: {0}")]
    Config(String),
}

/// A manifest document as the registry returned it.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    /// Raw `Content-Type` header, if any.
    pub media_type: Option<String>,
    pub body: Vec<u8>,
}

/// An open blob response body.
pub struct BlobStream {
    /// Declared `Content-Length`, absent for chunked responses.
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read>,
}

/// Trait for registry backends.
///
/// `reference` is a tag or a digest string; both are opaque path segments.
pub trait RegistrySource: Send + Sync {
    /// Fetch a manifest or manifest list.
    fn fetch_manifest(
        &self,
        repository: &str,
        reference: &str,
    ) -> Result<FetchedManifest, RegistryError>;

    /// Open a streaming read of a blob.
    fn fetch_blob(&self, repository: &str, digest: &Digest) -> Result<BlobStream, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_reason() {
        let e = RegistryError::Status {
            url: "https://r.example/v2/a/manifests/b".to_owned(),
            status: 500,
            reason: "Internal Server Error".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("Internal Server Error"));
    }

    #[test]
    fn user_agent_names_crate_version() {
        assert!(USER_AGENT.starts_with("tarpull/"));
    }
}
