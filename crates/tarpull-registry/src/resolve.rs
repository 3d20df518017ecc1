use crate::{RegistryError, RegistrySource};
use tarpull_schema::{parse_manifest, ImageManifest, ManifestDocument, Platform};

/// One platform-specific manifest ready to be bundled.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub manifest: ImageManifest,
    /// Manifest bytes exactly as served.
    pub raw: Vec<u8>,
    /// Tag or digest the manifest was fetched by.
    pub reference: String,
    /// Platform of the manifest-list entry, when resolved through a list.
    pub platform: Option<Platform>,
}

/// Resolve `repository:tag` to the image manifests for `target`.
///
/// A single-platform manifest yields itself. A manifest list or index yields
/// every entry matching `target`, in list order, each fetched by digest and
/// checked against it. A list with no matching entry is an error.
pub fn resolve(
    source: &dyn RegistrySource,
    repository: &str,
    tag: &str,
    target: &Platform,
) -> Result<Vec<ResolvedImage>, RegistryError> {
    // 1. Fetch the tagged document
    let fetched = source.fetch_manifest(repository, tag)?;
    let media_type = fetched.media_type.as_deref().unwrap_or_default();

    // 2. Single-platform manifest: done
    let list = match parse_manifest(media_type, &fetched.body)? {
        ManifestDocument::Image(manifest) => {
            tracing::debug!(
                "{repository}:{tag}: image manifest, {} layers",
                manifest.layers.len()
            );
            return Ok(vec![ResolvedImage {
                manifest,
                raw: fetched.body,
                reference: tag.to_owned(),
                platform: None,
            }]);
        }
        ManifestDocument::List(list) => list,
    };

    // 3. Manifest list: follow matching entries by digest
    tracing::debug!(
        "{repository}:{tag}: manifest list with {} entries",
        list.manifests.len()
    );
    let mut resolved = Vec::new();
    for entry in list.matching(target) {
        let expected = &entry.descriptor.digest;
        let reference = expected.to_string();
        let child = source.fetch_manifest(repository, &reference)?;

        let actual = expected.algorithm().hash(&child.body);
        if actual != *expected {
            return Err(RegistryError::ManifestDigestMismatch {
                expected: reference,
                actual: actual.to_string(),
            });
        }

        let child_type = child
            .media_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&entry.descriptor.media_type);
        let ManifestDocument::Image(manifest) = parse_manifest(child_type, &child.body)? else {
            return Err(RegistryError::NestedList(reference));
        };
        tracing::debug!(
            "{repository}:{tag}: selected {reference} ({})",
            entry
                .platform
                .as_ref()
                .map_or_else(String::new, ToString::to_string)
        );
        resolved.push(ResolvedImage {
            manifest,
            raw: child.body,
            reference,
            platform: entry.platform.clone(),
        });
    }

    // 4. Nothing for this platform
    if resolved.is_empty() {
        return Err(RegistryError::NoMatchingPlatform {
            reference: format!("{repository}:{tag}"),
            platform: target.to_string(),
        });
    }
    Ok(resolved)
}
