//! Manifest media types understood by the resolver.

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST_V2: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// `Accept` header value for manifest requests, listing every supported type.
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.oci.image.index.v1+json";

/// Shape of a manifest document, derived from its media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// A single-platform image manifest (Docker v2 schema 2 or OCI).
    Image,
    /// A manifest list or OCI image index.
    List,
}

/// Strip media-type parameters (`; charset=utf-8`) and surrounding whitespace.
pub fn normalize_content_type(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(base, _)| base)
        .trim()
}

/// Map a media type to the manifest shape it announces.
pub fn classify(media_type: &str) -> Option<ManifestKind> {
    match normalize_content_type(media_type) {
        DOCKER_MANIFEST_V2 | OCI_IMAGE_MANIFEST => Some(ManifestKind::Image),
        DOCKER_MANIFEST_LIST_V2 | OCI_IMAGE_INDEX => Some(ManifestKind::List),
        _ => None,
    }
}

/// Content types that say nothing about the manifest shape.
pub(crate) fn is_generic(media_type: &str) -> bool {
    matches!(
        normalize_content_type(media_type),
        "" | "application/json" | "application/octet-stream" | "text/plain"
    )
}
