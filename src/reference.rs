//! Image reference parsing.
//!
//! Accepts the usual shorthand forms and expands them to a fully qualified
//! `(registry, namespace, image, tag)` tuple:
//!
//! | Input | Registry | Namespace | Image | Tag |
//! |-------|----------|-----------|-------|-----|
//! | `alpine` | registry-1.docker.io | library | alpine | latest |
//! | `alpine:3.19` | registry-1.docker.io | library | alpine | 3.19 |
//! | `grafana/loki:2.9` | registry-1.docker.io | grafana | loki | 2.9 |
//! | `ghcr.io/org/sub/app:v1` | ghcr.io | org/sub | app | v1 |
//!
//! A leading segment is treated as a registry host only when it contains a
//! `.` or a `:` (port); otherwise it is a Docker Hub namespace.

use crate::constants::{DEFAULT_NAMESPACE, DEFAULT_REGISTRY, DEFAULT_TAG};
use crate::error::{Error, Result};

/// Parsed OCI/Docker image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host, possibly with a port.
    pub registry: String,
    /// Repository namespace; deep namespaces keep their `/` separators.
    pub namespace: String,
    /// Image name, always non-empty.
    pub image: String,
    /// Tag, defaulting to `latest`.
    pub tag: String,
}

impl ImageRef {
    /// Parses a textual image reference.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.trim().is_empty() {
            return Err(Error::InvalidImageReference {
                reference: reference.to_string(),
                reason: "reference is empty".to_string(),
            });
        }

        let mut registry = DEFAULT_REGISTRY.to_string();
        let mut namespace = DEFAULT_NAMESPACE.to_string();
        let mut tag = DEFAULT_TAG.to_string();

        // The rightmost ':' starts a tag only when no '/' follows it;
        // otherwise it belongs to a registry port.
        let name_part = match reference.rfind(':') {
            Some(idx) if idx > 0 && !reference[idx..].contains('/') => {
                tag = reference[idx + 1..].to_string();
                &reference[..idx]
            }
            _ => reference,
        };

        let parts: Vec<&str> = name_part.split('/').collect();
        let image = match parts.as_slice() {
            [name] => name.to_string(),
            [first, name] => {
                if first.contains('.') || first.contains(':') {
                    registry = first.to_string();
                } else {
                    namespace = first.to_string();
                }
                name.to_string()
            }
            [first, middle @ .., name] => {
                registry = first.to_string();
                namespace = middle.join("/");
                name.to_string()
            }
            [] => String::new(),
        };

        if image.is_empty() {
            return Err(Error::InvalidImageReference {
                reference: reference.to_string(),
                reason: "image name is empty".to_string(),
            });
        }

        Ok(Self {
            registry,
            namespace,
            image,
            tag,
        })
    }

    /// Full repository path, e.g. `library/alpine`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.image)
    }

    /// Display name, e.g. `library/alpine:latest`.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.repository(), self.tag)
    }

    /// Registry base URL for v2 API calls.
    pub fn registry_url(&self) -> String {
        format!("https://{}", self.registry)
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
