//! Image pulling and caching.
//!
//! Orchestrates pull → download → extract and caches the flattened rootfs
//! so an image is only materialized once. Cache layout:
//!
//! ```text
//! ~/.jcontainer/cache/<namespace>/<image>/<tag>/
//! ├── rootfs/      extracted, flattened filesystem
//! └── .complete    zero-byte sentinel; its presence is the only
//!                  signal the entry is valid
//! ```
//!
//! A pull that fails part-way leaves the partial tree on disk for
//! inspection; the next attempt clears it before starting over.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::constants::{CACHE_DIR, COMPLETE_MARKER, STATE_DIR};
use crate::error::{Error, Result};
use crate::extract::extract_layer;
use crate::reference::ImageRef;
use crate::registry::RegistryClient;

/// Pulls images from a registry and materializes them as rootfs trees.
pub struct ImageManager {
    client: RegistryClient,
    cache_dir: PathBuf,
}

impl ImageManager {
    /// Creates a manager using the default cache under `$HOME/.jcontainer`.
    pub fn new() -> Result<Self> {
        Self::with_cache_dir(default_cache_dir())
    }

    /// Creates a manager with a specific cache root.
    pub fn with_cache_dir(cache_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            client: RegistryClient::new()?,
            cache_dir,
        })
    }

    /// Pulls an image and returns the path to its extracted rootfs,
    /// reusing the cache when the entry is complete.
    pub async fn pull(&self, reference: &ImageRef) -> Result<PathBuf> {
        let image_dir = self.image_dir(reference);
        let rootfs = image_dir.join("rootfs");
        let marker = image_dir.join(COMPLETE_MARKER);

        if marker.exists() && rootfs.is_dir() {
            info!("using cached image: {}", reference.full_name());
            return Ok(rootfs);
        }

        info!("pulling image: {}", reference.full_name());

        // Clear any partial tree from an earlier failed pull.
        if image_dir.exists() {
            fs::remove_dir_all(&image_dir)?;
        }
        fs::create_dir_all(&rootfs)?;

        let token = self.client.fetch_token(reference).await?;
        let manifest = self.client.fetch_manifest(reference, &token).await?;

        let digests = manifest.layer_digests();
        if digests.is_empty() {
            return Err(Error::Registry {
                reference: reference.full_name(),
                reason: "image manifest has no layers".to_string(),
            });
        }

        let layers_dir = image_dir.join("layers");
        fs::create_dir_all(&layers_dir)?;

        for (index, digest) in digests.iter().enumerate() {
            let safe_name = digest.replace(':', "_");
            let layer_file = layers_dir.join(format!("{safe_name}.tar.gz"));

            info!(
                "  layer {}/{}: {}",
                index + 1,
                digests.len(),
                &digest[..digest.len().min(19)]
            );

            self.client
                .download_blob(reference, digest, &token, &layer_file)
                .await?;
            extract_layer(&layer_file, &rootfs)?;

            // Reclaim disk as we go; the tarball is not needed once applied.
            if let Err(e) = fs::remove_file(&layer_file) {
                warn!("failed to remove layer tarball {}: {e}", layer_file.display());
            }
        }

        let _ = fs::remove_dir(&layers_dir);
        fs::File::create(&marker)?;
        info!("image ready: {}", reference.full_name());

        Ok(rootfs)
    }

    /// Cache directory for one image, keyed by `(namespace, image, tag)`.
    fn image_dir(&self, reference: &ImageRef) -> PathBuf {
        self.cache_dir
            .join(&reference.namespace)
            .join(&reference.image)
            .join(&reference.tag)
    }

    /// Rootfs path for a cached image; the path may not exist yet.
    pub fn rootfs_path(&self, reference: &ImageRef) -> PathBuf {
        self.image_dir(reference).join("rootfs")
    }

    /// The cache root this manager operates on.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Default image cache root, `$HOME/.jcontainer/cache`.
pub fn default_cache_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(STATE_DIR).join(CACHE_DIR),
        None => PathBuf::from(STATE_DIR).join(CACHE_DIR),
    }
}
