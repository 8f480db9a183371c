//! Persistent container metadata.

use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::METADATA_FILE;
use crate::error::{Error, Result};

/// Lifecycle status of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Process was launched and has not been observed to terminate.
    Running,
    /// Process terminated on its own (exit code recorded when observed
    /// directly, null when inferred from a dead PID).
    Exited,
    /// Process was stopped by an explicit `stop`.
    Stopped,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Persistent record of one container, serialized as pretty-printed JSON
/// in the container's `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    /// Eight lowercase hex chars.
    pub id: String,
    /// PID of the spawned container process on the host.
    pub pid: u32,
    /// Launch time, ISO-8601 UTC.
    pub start_time: String,
    /// Absolute rootfs path the container was started with.
    pub rootfs: String,
    /// Image reference, when launched from an image.
    pub image: Option<String>,
    /// The command argv run inside the container.
    pub command: Vec<String>,
    /// Current lifecycle status.
    pub status: ContainerStatus,
    /// Exit code, once known.
    pub exit_code: Option<i32>,
}

impl ContainerState {
    /// Creates a fresh `running` record for a just-spawned container.
    pub fn create(
        id: String,
        rootfs: String,
        image: Option<String>,
        command: Vec<String>,
        pid: u32,
    ) -> Self {
        Self {
            id,
            pid,
            start_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            rootfs,
            image,
            command,
            status: ContainerStatus::Running,
            exit_code: None,
        }
    }

    /// Returns a copy with a new status and exit code.
    pub fn with_status(&self, status: ContainerStatus, exit_code: Option<i32>) -> Self {
        Self {
            status,
            exit_code,
            ..self.clone()
        }
    }

    /// Writes this state to `metadata.json` in the given directory,
    /// creating the directory if needed.
    pub fn save(&self, container_dir: &Path) -> Result<()> {
        fs::create_dir_all(container_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(container_dir.join(METADATA_FILE), json)?;
        Ok(())
    }

    /// Loads a state from a directory's `metadata.json`.
    pub fn load(container_dir: &Path) -> Result<Self> {
        let metadata_file = container_dir.join(METADATA_FILE);
        if !metadata_file.exists() {
            return Err(Error::NotFound(format!(
                "no metadata in {}",
                container_dir.display()
            )));
        }
        let json = fs::read_to_string(metadata_file)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Generates an 8-character random hex container id.
pub fn generate_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex() {
        for _ in 0..32 {
            let id = generate_id();
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        }
    }

    #[test]
    fn test_with_status_preserves_identity() {
        let state = ContainerState::create(
            "cafe0123".to_string(),
            "/tmp/rootfs".to_string(),
            None,
            vec!["/bin/sh".to_string()],
            42,
        );
        let updated = state.with_status(ContainerStatus::Exited, Some(3));
        assert_eq!(updated.id, state.id);
        assert_eq!(updated.pid, state.pid);
        assert_eq!(updated.start_time, state.start_time);
        assert_eq!(updated.status, ContainerStatus::Exited);
        assert_eq!(updated.exit_code, Some(3));
    }

    #[test]
    fn test_metadata_uses_camel_case_keys() {
        let state = ContainerState::create(
            "cafe0123".to_string(),
            "/tmp/rootfs".to_string(),
            Some("library/alpine:latest".to_string()),
            vec!["/bin/sh".to_string()],
            42,
        );
        let json = serde_json::to_string_pretty(&state).unwrap();
        assert!(json.contains("\"startTime\""));
        assert!(json.contains("\"exitCode\""));
        assert!(json.contains("\"status\": \"running\""));
    }
}
