//! Persistent container store.
//!
//! One directory per container under `$HOME/.jcontainer/containers/<id>/`
//! holding `metadata.json` plus the tee'd `stdout.log` / `stderr.log`.
//! The store is the source of truth for container metadata, but liveness
//! of `running` containers is reconciled against the OS process table on
//! every read: a recorded PID that is no longer alive flips the record to
//! `exited` before it is returned.
//!
//! The store is not locked; callers must not issue concurrent writes
//! against the same container id.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::{CONTAINERS_DIR, STATE_DIR, STDERR_LOG, STDOUT_LOG};
use crate::error::{Error, Result};
use crate::state::{ContainerState, ContainerStatus};

/// Filesystem-backed registry of containers.
pub struct ContainerStore {
    base_dir: PathBuf,
}

impl ContainerStore {
    /// Creates a store over the default base directory.
    pub fn new() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }

    /// Creates a store over a specific base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Registers a new container: creates its directory and writes the
    /// initial metadata.
    pub fn register(&self, state: &ContainerState) -> Result<()> {
        state.save(&self.container_dir(&state.id))
    }

    /// Loads one container's state by id.
    pub fn get(&self, id: &str) -> Result<ContainerState> {
        let dir = self.container_dir(id);
        if !dir.is_dir() {
            return Err(Error::NotFound(id.to_string()));
        }
        ContainerState::load(&dir).map_err(|_| Error::NotFound(id.to_string()))
    }

    /// Lists all containers, reconciling `running` records against actual
    /// process liveness. Directories without valid metadata are skipped;
    /// a missing base directory yields an empty list.
    pub fn list_all(&self) -> Result<Vec<ContainerState>> {
        if !self.base_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut containers = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let Ok(mut state) = ContainerState::load(&dir) else {
                continue;
            };
            if state.status == ContainerStatus::Running && !is_process_alive(state.pid) {
                debug!(id = %state.id, pid = state.pid, "reconciling dead container");
                state = state.with_status(ContainerStatus::Exited, None);
                state.save(&dir)?;
            }
            containers.push(state);
        }
        Ok(containers)
    }

    /// Read-modify-writes one container's status and exit code.
    pub fn update_status(
        &self,
        id: &str,
        status: ContainerStatus,
        exit_code: Option<i32>,
    ) -> Result<()> {
        let state = self.get(id)?;
        state
            .with_status(status, exit_code)
            .save(&self.container_dir(id))
    }

    /// Removes a container's directory. Refuses while the recorded
    /// process is still alive.
    pub fn remove(&self, id: &str) -> Result<()> {
        let state = self.get(id)?;
        if state.status == ContainerStatus::Running && is_process_alive(state.pid) {
            return Err(Error::StillRunning(id.to_string()));
        }
        fs::remove_dir_all(self.container_dir(id))?;
        Ok(())
    }

    /// Directory holding one container's metadata and logs.
    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.base_dir.join(id)
    }

    /// Path of the captured stdout log.
    pub fn stdout_log(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(STDOUT_LOG)
    }

    /// Path of the captured stderr log.
    pub fn stderr_log(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(STDERR_LOG)
    }

    /// The base directory this store operates on.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for ContainerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Default store base directory, `$HOME/.jcontainer/containers`.
pub fn default_base_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(STATE_DIR).join(CONTAINERS_DIR),
        None => PathBuf::from(STATE_DIR).join(CONTAINERS_DIR),
    }
}

/// Whether the OS reports a process with this PID as alive.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    // Signal 0 performs error checking only. EPERM still means the
    // process exists.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    false
}
