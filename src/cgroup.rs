//! Cgroups v2 resource management.
//!
//! Creates a per-container subgroup under `<root>/jcontainer/`, enables
//! the cpu and memory controllers on the parent, writes limits, and
//! attaches the container process. All operations are plain filesystem
//! I/O against cgroupfs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::{CGROUP_PARENT, CPU_PERIOD_USEC};
use crate::error::{Error, Result};

/// Handle to one container's cgroup directory.
#[derive(Debug)]
pub struct CgroupManager {
    parent_path: PathBuf,
    cgroup_path: PathBuf,
}

impl CgroupManager {
    /// Creates a manager for `<cgroup_root>/jcontainer/<container_id>`.
    /// Nothing is touched on disk until [`CgroupManager::create`].
    pub fn new(cgroup_root: &Path, container_id: &str) -> Self {
        let parent_path = cgroup_root.join(CGROUP_PARENT);
        let cgroup_path = parent_path.join(container_id);
        Self {
            parent_path,
            cgroup_path,
        }
    }

    /// Creates the cgroup directory and enables controllers on the parent.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.cgroup_path).map_err(|e| Error::Cgroup {
            path: self.cgroup_path.clone(),
            reason: e.to_string(),
        })?;
        self.enable_controllers()?;
        debug!(path = %self.cgroup_path.display(), "cgroup created");
        Ok(())
    }

    /// Enables cpu and memory inheritance on the shared parent group.
    /// The kernel treats a duplicate enable as idempotent, so concurrent
    /// containers can all issue this write.
    fn enable_controllers(&self) -> Result<()> {
        let subtree_control = self.parent_path.join("cgroup.subtree_control");
        self.write_control(&subtree_control, "+cpu +memory\n")
    }

    /// Sets the memory limit in bytes.
    pub fn set_memory_limit(&self, bytes: u64) -> Result<()> {
        self.write_control(&self.cgroup_path.join("memory.max"), &format!("{bytes}\n"))
    }

    /// Sets the CPU limit as a percentage of one core: 100 is a full core,
    /// 200 is two cores, 50 is half. The value is not clamped.
    pub fn set_cpu_limit(&self, percent: u32) -> Result<()> {
        let quota = u64::from(percent) * 1000;
        self.write_control(
            &self.cgroup_path.join("cpu.max"),
            &format!("{quota} {CPU_PERIOD_USEC}\n"),
        )
    }

    /// Moves a process into this cgroup. Must run after the target has
    /// been spawned.
    pub fn add_process(&self, pid: u32) -> Result<()> {
        self.write_control(&self.cgroup_path.join("cgroup.procs"), &format!("{pid}\n"))
    }

    /// Removes the container cgroup, and the shared parent if it is now
    /// empty. Both removals are best-effort and never fatal.
    pub fn close(self) {
        if let Err(e) = fs::remove_dir(&self.cgroup_path) {
            if self.cgroup_path.exists() {
                warn!(
                    "failed to remove cgroup {}: {e}",
                    self.cgroup_path.display()
                );
            }
        }
        if is_empty_dir(&self.parent_path) {
            let _ = fs::remove_dir(&self.parent_path);
        }
    }

    /// Path of this container's cgroup directory.
    pub fn cgroup_path(&self) -> &Path {
        &self.cgroup_path
    }

    fn write_control(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents).map_err(|e| Error::Cgroup {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn is_empty_dir(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}
