use crate::layout::blob_path;
use crate::ArchiveError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tarpull_schema::{Descriptor, Digest, ImageManifest};

/// Registry metadata kept for each layer so the runtime can relate the
/// archived blob to its original descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSource {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    pub digest: Digest,
}

impl From<&Descriptor> for LayerSource {
    fn from(d: &Descriptor) -> Self {
        Self {
            media_type: d.media_type.clone(),
            size: d.size,
            digest: d.digest.clone(),
        }
    }
}

/// One image in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogEntry {
    pub config: String,
    pub repo_tags: Vec<String>,
    pub layers: Vec<String>,
    /// Keyed by the layer's digest string, not its path.
    pub layer_sources: BTreeMap<String, LayerSource>,
}

impl CatalogEntry {
    /// Build the entry for a manifest whose blobs are (or will be) written at
    /// their content-addressed paths. Layer order is preserved.
    pub fn from_manifest(repo_tag: String, manifest: &ImageManifest) -> Self {
        let layers = manifest.layers.iter().map(|l| blob_path(&l.digest)).collect();
        let layer_sources = manifest
            .layers
            .iter()
            .map(|l| (l.digest.to_string(), LayerSource::from(l)))
            .collect();
        Self {
            config: blob_path(&manifest.config.digest),
            repo_tags: vec![repo_tag],
            layers,
            layer_sources,
        }
    }
}

/// Ordered list of catalog entries, serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CatalogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every archive path any entry points at.
    pub fn referenced_paths(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .flat_map(|e| std::iter::once(e.config.as_str()).chain(e.layers.iter().map(String::as_str)))
            .collect()
    }

    /// Pretty-printed JSON, two-space indent, fields in declaration order and
    /// map keys sorted.
    pub fn to_json(&self) -> Result<Vec<u8>, ArchiveError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, ArchiveError> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ImageManifest {
        let body = format!(
            r#"{{"schemaVersion":2,"mediaType":"application/vnd.docker.distribution.manifest.v2+json",
"config":{{"mediaType":"application/vnd.docker.container.image.v1+json","size":1469,"digest":"sha256:{b}"}},
"layers":[
 {{"mediaType":"application/vnd.docker.image.rootfs.diff.tar.gzip","size":300,"digest":"sha256:{c}"}},
 {{"mediaType":"application/vnd.docker.image.rootfs.diff.tar.gzip","size":100,"digest":"sha256:{a}"}}]}}"#,
            a = "a".repeat(64),
            b = "b".repeat(64),
            c = "c".repeat(64),
        );
        serde_json::from_str(&body).unwrap()
    }

    #[test]
    fn entry_keeps_layer_order() {
        let entry = CatalogEntry::from_manifest("library/alpine:3.18".to_owned(), &manifest());
        assert_eq!(entry.config, format!("blobs/sha256/{}", "b".repeat(64)));
        assert_eq!(
            entry.layers,
            vec![
                format!("blobs/sha256/{}", "c".repeat(64)),
                format!("blobs/sha256/{}", "a".repeat(64)),
            ]
        );
        assert_eq!(entry.repo_tags, vec!["library/alpine:3.18"]);
    }

    #[test]
    fn layer_sources_keyed_by_digest() {
        let entry = CatalogEntry::from_manifest("x:y".to_owned(), &manifest());
        let key = format!("sha256:{}", "a".repeat(64));
        let src = &entry.layer_sources[&key];
        assert_eq!(src.size, 100);
        assert_eq!(src.digest.to_string(), key);
        assert_eq!(src.media_type, "application/vnd.docker.image.rootfs.diff.tar.gzip");
    }

    #[test]
    fn json_shape_matches_runtime_format() {
        let mut catalog = Catalog::new();
        catalog.push(CatalogEntry::from_manifest("x:y".to_owned(), &manifest()));
        let json = String::from_utf8(catalog.to_json().unwrap()).unwrap();

        assert!(json.starts_with("[\n  {\n    \"Config\": "));
        let config = json.find("\"Config\"").unwrap();
        let tags = json.find("\"RepoTags\"").unwrap();
        let layers = json.find("\"Layers\"").unwrap();
        let sources = json.find("\"LayerSources\"").unwrap();
        assert!(config < tags && tags < layers && layers < sources);
        assert!(json.contains("\"mediaType\""));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn empty_catalog_is_empty_array() {
        assert_eq!(Catalog::new().to_json().unwrap(), b"[]");
    }

    #[test]
    fn referenced_paths_cover_config_and_layers() {
        let mut catalog = Catalog::new();
        catalog.push(CatalogEntry::from_manifest("x:1".to_owned(), &manifest()));
        catalog.push(CatalogEntry::from_manifest("x:2".to_owned(), &manifest()));
        // shared blobs collapse
        assert_eq!(catalog.referenced_paths().len(), 3);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn from_json_reads_back() {
        let mut catalog = Catalog::new();
        catalog.push(CatalogEntry::from_manifest("x:y".to_owned(), &manifest()));
        let back = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(back, catalog);
    }
}
