//! Docker Hub v2 registry client.
//!
//! Handles auth tokens, manifest fetching (including multi-platform
//! indexes), and blob downloads. All requests are plain HTTPS GETs with
//! bearer auth; any non-200 response is fatal for the pull.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::{AUTH_SERVICE, AUTH_URL, MANIFEST_LIST_V2, MANIFEST_V2, OCI_INDEX, OCI_MANIFEST};
use crate::error::{Error, Result};
use crate::reference::ImageRef;

// =============================================================================
// Manifest Model
// =============================================================================

/// An image manifest or manifest index, as returned by the registry.
///
/// Single-platform manifests carry `layers`; multi-platform indexes carry
/// `manifests`. Both shapes deserialize into this one struct and are told
/// apart by [`Manifest::is_index`].
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Declared media type; may be absent on older registries.
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    /// Per-platform manifest descriptors (index form).
    #[serde(default)]
    pub manifests: Option<Vec<ManifestDescriptor>>,
    /// Layer descriptors (single-platform form).
    #[serde(default)]
    pub layers: Option<Vec<LayerDescriptor>>,
}

/// Entry of a manifest index pointing at a per-platform manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestDescriptor {
    pub digest: String,
    pub platform: Option<PlatformDescriptor>,
}

/// Target platform of an index entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformDescriptor {
    pub os: String,
    pub architecture: String,
}

/// One image layer blob.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerDescriptor {
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl Manifest {
    /// Whether this document is a multi-platform index that must be
    /// resolved to a per-platform manifest.
    pub fn is_index(&self) -> bool {
        self.media_type == MANIFEST_LIST_V2
            || self.media_type == OCI_INDEX
            || self.manifests.is_some()
    }

    /// Layer digests in manifest order; empty when the document carries
    /// no `layers` array.
    pub fn layer_digests(&self) -> Vec<String> {
        self.layers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|l| l.digest.clone())
            .collect()
    }
}

/// Selects the digest of the index entry matching the current platform.
///
/// Architecture names are normalized (`x86_64` ≡ `amd64`, `aarch64` ≡
/// `arm64`). When nothing matches, falls back to the first entry with a
/// warning rather than failing the pull.
pub fn select_platform_digest(manifest: &Manifest, reference: &ImageRef) -> Result<String> {
    let target_arch = match std::env::consts::ARCH {
        "x86_64" | "amd64" => "amd64",
        "aarch64" | "arm64" => "arm64",
        other => other,
    };

    let entries = manifest.manifests.as_deref().unwrap_or_default();
    if entries.is_empty() {
        return Err(Error::Registry {
            reference: reference.full_name(),
            reason: "manifest index has no entries".to_string(),
        });
    }

    for entry in entries {
        if let Some(platform) = &entry.platform
            && platform.os == "linux"
            && platform.architecture == target_arch
        {
            return Ok(entry.digest.clone());
        }
    }

    warn!(
        "no matching platform found for linux/{}, using first manifest entry",
        target_arch
    );
    Ok(entries[0].digest.clone())
}

// =============================================================================
// Client
// =============================================================================

/// Client for the Docker registry v2 pull protocol.
pub struct RegistryClient {
    http: reqwest::Client,
}

impl RegistryClient {
    /// Creates a client; redirects are followed (blob downloads commonly
    /// 307 to a CDN).
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /// Fetches a pull-scoped bearer token for the repository.
    pub async fn fetch_token(&self, reference: &ImageRef) -> Result<String> {
        let url = format!(
            "{}?service={}&scope=repository:{}:pull",
            AUTH_URL,
            AUTH_SERVICE,
            reference.repository()
        );
        debug!(%url, "requesting auth token");

        let response = self.http.get(&url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Registry {
                reference: reference.full_name(),
                reason: format!("auth token request returned HTTP {}", response.status()),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| Error::Registry {
            reference: reference.full_name(),
            reason: format!("malformed token response: {e}"),
        })?;
        Ok(body.token)
    }

    /// Fetches the image manifest, resolving a multi-platform index to the
    /// platform-appropriate manifest (one level deep).
    pub async fn fetch_manifest(&self, reference: &ImageRef, token: &str) -> Result<Manifest> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            reference.registry_url(),
            reference.repository(),
            reference.tag
        );
        let accept = [MANIFEST_V2, MANIFEST_LIST_V2, OCI_MANIFEST, OCI_INDEX].join(",");
        let manifest = self.get_manifest(reference, &url, &accept, token).await?;

        if manifest.is_index() {
            let digest = select_platform_digest(&manifest, reference)?;
            return self.fetch_manifest_by_digest(reference, &digest, token).await;
        }

        Ok(manifest)
    }

    async fn fetch_manifest_by_digest(
        &self,
        reference: &ImageRef,
        digest: &str,
        token: &str,
    ) -> Result<Manifest> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            reference.registry_url(),
            reference.repository(),
            digest
        );
        let accept = [MANIFEST_V2, OCI_MANIFEST].join(",");
        self.get_manifest(reference, &url, &accept, token).await
    }

    async fn get_manifest(
        &self,
        reference: &ImageRef,
        url: &str,
        accept: &str,
        token: &str,
    ) -> Result<Manifest> {
        debug!(%url, "fetching manifest");
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Registry {
                reference: reference.full_name(),
                reason: format!("manifest request returned HTTP {}", response.status()),
            });
        }

        response.json().await.map_err(|e| Error::Registry {
            reference: reference.full_name(),
            reason: format!("malformed manifest: {e}"),
        })
    }

    /// Downloads a blob (layer) to a local file.
    pub async fn download_blob(
        &self,
        reference: &ImageRef,
        digest: &str,
        token: &str,
        dest: &Path,
    ) -> Result<()> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            reference.registry_url(),
            reference.repository(),
            digest
        );
        debug!(%url, "downloading blob");

        let mut response = self.http.get(&url).bearer_auth(token).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Registry {
                reference: reference.full_name(),
                reason: format!("blob {digest} returned HTTP {}", response.status()),
            });
        }

        let mut file = std::fs::File::create(dest)?;
        while let Some(chunk) = response.chunk().await? {
            std::io::Write::write_all(&mut file, &chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_manifest(entries: Vec<ManifestDescriptor>) -> Manifest {
        Manifest {
            media_type: OCI_INDEX.to_string(),
            manifests: Some(entries),
            layers: None,
        }
    }

    fn entry(digest: &str, os: &str, arch: &str) -> ManifestDescriptor {
        ManifestDescriptor {
            digest: digest.to_string(),
            platform: Some(PlatformDescriptor {
                os: os.to_string(),
                architecture: arch.to_string(),
            }),
        }
    }

    #[test]
    fn test_index_detection_by_media_type() {
        let m = Manifest {
            media_type: MANIFEST_LIST_V2.to_string(),
            manifests: None,
            layers: None,
        };
        assert!(m.is_index());
    }

    #[test]
    fn test_index_detection_by_manifests_array() {
        let m = Manifest {
            media_type: String::new(),
            manifests: Some(vec![]),
            layers: None,
        };
        assert!(m.is_index());
    }

    #[test]
    fn test_single_manifest_is_not_index() {
        let m = Manifest {
            media_type: MANIFEST_V2.to_string(),
            manifests: None,
            layers: Some(vec![]),
        };
        assert!(!m.is_index());
    }

    #[test]
    fn test_platform_selection_falls_back_to_first() {
        let reference = ImageRef::parse("alpine").unwrap();
        let m = index_manifest(vec![
            entry("sha256:aaa", "plan9", "mips"),
            entry("sha256:bbb", "plan9", "sparc"),
        ]);
        let digest = select_platform_digest(&m, &reference).unwrap();
        assert_eq!(digest, "sha256:aaa");
    }

    #[test]
    fn test_platform_selection_empty_index_fails() {
        let reference = ImageRef::parse("alpine").unwrap();
        let m = index_manifest(vec![]);
        assert!(select_platform_digest(&m, &reference).is_err());
    }

    #[test]
    fn test_layer_digests_in_order() {
        let m = Manifest {
            media_type: MANIFEST_V2.to_string(),
            manifests: None,
            layers: Some(vec![
                LayerDescriptor {
                    digest: "sha256:one".to_string(),
                    size: 1,
                    media_type: String::new(),
                },
                LayerDescriptor {
                    digest: "sha256:two".to_string(),
                    size: 2,
                    media_type: String::new(),
                },
            ]),
        };
        assert_eq!(m.layer_digests(), vec!["sha256:one", "sha256:two"]);
    }
}
