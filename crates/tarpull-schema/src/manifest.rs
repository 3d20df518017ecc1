use crate::media::{self, ManifestKind};
use crate::{Digest, Platform, SchemaError};
use serde::{Deserialize, Serialize};

/// Reference to a content-addressed blob or manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub size: u64,
    pub digest: Digest,
}

/// One platform-specific image: a config blob plus ordered layer blobs.
///
/// Layer order is the filesystem application order and is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestListEntry {
    #[serde(flatten)]
    pub descriptor: Descriptor,
    /// Absent on non-runnable entries such as attestation manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// A Docker manifest list or OCI image index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub manifests: Vec<ManifestListEntry>,
}

impl ManifestList {
    /// Entries whose platform satisfies `target`, in document order.
    pub fn matching<'a>(
        &'a self,
        target: &'a Platform,
    ) -> impl Iterator<Item = &'a ManifestListEntry> + 'a {
        self.manifests
            .iter()
            .filter(move |m| m.platform.as_ref().is_some_and(|p| target.matches(p)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestDocument {
    Image(ImageManifest),
    List(ManifestList),
}

#[derive(Deserialize)]
struct MediaTypeProbe {
    #[serde(rename = "mediaType", default)]
    media_type: Option<String>,
}

/// Parse a manifest body according to the media type the registry announced.
///
/// When the announced type is missing or generic (`application/json`), the
/// document's own `mediaType` field decides. Any other unrecognized type is an
/// error.
pub fn parse_manifest(media_type: &str, body: &[u8]) -> Result<ManifestDocument, SchemaError> {
    let effective = if media::is_generic(media_type) {
        let probe: MediaTypeProbe =
            serde_json::from_slice(body).map_err(|source| SchemaError::Parse {
                kind: "manifest",
                source,
            })?;
        probe.media_type.unwrap_or_default()
    } else {
        media::normalize_content_type(media_type).to_owned()
    };

    match media::classify(&effective) {
        Some(ManifestKind::Image) => serde_json::from_slice(body)
            .map(ManifestDocument::Image)
            .map_err(|source| SchemaError::Parse {
                kind: "manifest",
                source,
            }),
        Some(ManifestKind::List) => serde_json::from_slice(body)
            .map(ManifestDocument::List)
            .map_err(|source| SchemaError::Parse {
                kind: "manifest list",
                source,
            }),
        None => Err(SchemaError::UnsupportedMediaType(if effective.is_empty() {
            media_type.to_owned()
        } else {
            effective
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{DOCKER_MANIFEST_LIST_V2, DOCKER_MANIFEST_V2, OCI_IMAGE_INDEX};

    fn hex(c: char) -> String {
        c.to_string().repeat(64)
    }

    fn docker_manifest() -> String {
        format!(
            r#"{{
  "schemaVersion": 2,
  "mediaType": "{DOCKER_MANIFEST_V2}",
  "config": {{
    "mediaType": "application/vnd.docker.container.image.v1+json",
    "size": 1469,
    "digest": "sha256:{}"
  }},
  "layers": [
    {{
      "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
      "size": 3370706,
      "digest": "sha256:{}"
    }},
    {{
      "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
      "size": 1024,
      "digest": "sha256:{}"
    }}
  ]
}}"#,
            hex('b'),
            hex('a'),
            hex('c')
        )
    }

    fn index(media_type: &str) -> String {
        format!(
            r#"{{
  "schemaVersion": 2,
  "mediaType": "{media_type}",
  "manifests": [
    {{"mediaType": "{DOCKER_MANIFEST_V2}", "size": 528, "digest": "sha256:{}",
      "platform": {{"architecture": "amd64", "os": "linux"}}}},
    {{"mediaType": "{DOCKER_MANIFEST_V2}", "size": 528, "digest": "sha256:{}",
      "platform": {{"architecture": "arm64", "os": "linux", "variant": "v8"}}}},
    {{"mediaType": "{DOCKER_MANIFEST_V2}", "size": 566, "digest": "sha256:{}",
      "platform": {{"architecture": "unknown", "os": "unknown"}}}}
  ]
}}"#,
            hex('1'),
            hex('2'),
            hex('3')
        )
    }

    #[test]
    fn parse_docker_v2_preserves_layer_order() {
        let doc = parse_manifest(DOCKER_MANIFEST_V2, docker_manifest().as_bytes()).unwrap();
        let ManifestDocument::Image(m) = doc else {
            panic!("expected image manifest");
        };
        assert_eq!(m.schema_version, 2);
        assert_eq!(m.config.size, 1469);
        assert_eq!(m.layers.len(), 2);
        assert_eq!(m.layers[0].digest.hex(), hex('a'));
        assert_eq!(m.layers[1].digest.hex(), hex('c'));
    }

    #[test]
    fn parse_manifest_list() {
        let body = index(DOCKER_MANIFEST_LIST_V2);
        let doc = parse_manifest(DOCKER_MANIFEST_LIST_V2, body.as_bytes()).unwrap();
        let ManifestDocument::List(list) = doc else {
            panic!("expected list");
        };
        assert_eq!(list.manifests.len(), 3);
        let target = Platform::default();
        let matching: Vec<_> = list.matching(&target).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].descriptor.digest.hex(), hex('1'));
    }

    #[test]
    fn parse_oci_index_like_a_list() {
        let body = index(OCI_IMAGE_INDEX);
        let doc = parse_manifest(OCI_IMAGE_INDEX, body.as_bytes()).unwrap();
        assert!(matches!(doc, ManifestDocument::List(_)));
    }

    #[test]
    fn generic_content_type_falls_back_to_body() {
        let doc = parse_manifest(
            "application/json; charset=utf-8",
            docker_manifest().as_bytes(),
        )
        .unwrap();
        assert!(matches!(doc, ManifestDocument::Image(_)));
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let err = parse_manifest(
            "application/vnd.docker.distribution.manifest.v1+prettyjws",
            b"{}",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedMediaType(_)));
    }

    #[test]
    fn generic_type_without_body_media_type_is_rejected() {
        let err = parse_manifest("application/json", b"{\"schemaVersion\": 2}").unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedMediaType(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse_manifest(DOCKER_MANIFEST_V2, b"{not json").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { kind: "manifest", .. }));
    }

    #[test]
    fn bad_digest_in_manifest_is_parse_error() {
        let body = docker_manifest().replace(&hex('a'), "zz");
        assert!(parse_manifest(DOCKER_MANIFEST_V2, body.as_bytes()).is_err());
    }
}
