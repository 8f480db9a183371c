//! Platform strategy selection.
//!
//! Linux gets the full treatment: mount/UTS namespaces in the parent, a
//! PID (and optionally network) namespace for the child via
//! `unshare --fork`, and `pivot_root` inside. Everything else degrades to
//! chroot-based filesystem isolation so the runtime stays usable on
//! development hosts.
//!
//! The variant is chosen once at startup; there is no runtime switching.

use tracing::warn;

use crate::constants::OLD_ROOT_DIR;
use crate::error::{Error, Result};
use crate::syscall;

/// Isolation strategy for the current host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Full namespace isolation.
    Linux,
    /// Chroot-only filesystem isolation.
    Degraded,
}

impl Platform {
    /// Detects the strategy from the OS identifier.
    pub fn detect() -> Self {
        if std::env::consts::OS.contains("linux") {
            Self::Linux
        } else {
            Self::Degraded
        }
    }

    /// Whether this is the full Linux strategy.
    pub fn is_linux(self) -> bool {
        self == Self::Linux
    }

    /// Prepares the parent process before spawning the child.
    ///
    /// On Linux this unshares the mount and UTS namespaces so the
    /// per-container mounts and hostname never leak to the host. The new
    /// PID namespace cannot be created here: it only applies to children
    /// forked afterwards, which is why the child command is wrapped in
    /// `unshare --pid --fork`.
    pub fn setup_parent(self) -> Result<()> {
        match self {
            Self::Linux => {
                let rc = syscall::unshare(syscall::CLONE_NEWNS | syscall::CLONE_NEWUTS);
                if rc != 0 {
                    return Err(Error::Syscall {
                        operation: "unshare(CLONE_NEWNS | CLONE_NEWUTS)".to_string(),
                        code: rc as i64,
                    });
                }
                Ok(())
            }
            Self::Degraded => {
                warn!("running without Linux namespaces; isolation is limited to chroot");
                warn!("PID, mount, and UTS namespace isolation is not available");
                Ok(())
            }
        }
    }

    /// Builds the argv used to spawn the child process.
    ///
    /// The Linux variant re-executes the current binary under
    /// `unshare --pid [--net] --fork` so the child initializer starts as
    /// PID 1 of a fresh PID namespace.
    pub fn build_child_command(
        self,
        rootfs: &str,
        command: &[String],
        network_enabled: bool,
    ) -> Result<Vec<String>> {
        let self_exe = std::env::current_exe()?
            .to_string_lossy()
            .into_owned();

        let mut argv = Vec::new();
        if self.is_linux() {
            argv.push("unshare".to_string());
            argv.push("--pid".to_string());
            if network_enabled {
                argv.push("--net".to_string());
            }
            argv.push("--fork".to_string());
        }
        argv.push(self_exe);
        argv.push("child".to_string());
        argv.push(rootfs.to_string());
        argv.extend(command.iter().cloned());
        Ok(argv)
    }

    /// Swaps the child's filesystem root onto the rootfs.
    pub fn setup_filesystem(self, rootfs: &str) -> Result<()> {
        match self {
            Self::Linux => pivot_into(rootfs),
            Self::Degraded => {
                check("chroot", syscall::chroot(rootfs))?;
                check("chdir /", syscall::chdir("/"))?;
                Ok(())
            }
        }
    }

    /// Sets the container hostname. Skipped in degraded mode, where it
    /// would change the host's hostname.
    pub fn set_hostname(self, hostname: &str) -> Result<()> {
        match self {
            Self::Linux => check("sethostname", syscall::sethostname(hostname)),
            Self::Degraded => Ok(()),
        }
    }
}

/// The pivot_root sequence run inside the new mount namespace.
fn pivot_into(rootfs: &str) -> Result<()> {
    // Make the mount tree private so changes don't propagate to the host.
    check(
        "mount / as private",
        syscall::mount(
            Some("none"),
            "/",
            None,
            syscall::MS_REC | syscall::MS_PRIVATE,
            None,
        ),
    )?;

    // pivot_root requires new_root to be a mount point distinct from /.
    check(
        "bind mount rootfs",
        syscall::mount(Some(rootfs), rootfs, None, syscall::MS_BIND, None),
    )?;

    let old_root = std::path::Path::new(rootfs).join(OLD_ROOT_DIR);
    std::fs::create_dir_all(&old_root)?;

    let rc = syscall::pivot_root(rootfs, &old_root.to_string_lossy());
    if rc != 0 {
        return Err(Error::Syscall {
            operation: "pivot_root".to_string(),
            code: rc as i64,
        });
    }

    check("chdir /", syscall::chdir("/"))?;

    // Mount /proc for process visibility inside the PID namespace.
    std::fs::create_dir_all("/proc")?;
    check(
        "mount proc",
        syscall::mount(Some("proc"), "/proc", Some("proc"), 0, None),
    )?;

    // Detach the old root and remove its mount point.
    check(
        "umount2 oldrootfs",
        syscall::umount2(&format!("/{OLD_ROOT_DIR}"), syscall::MNT_DETACH),
    )?;
    let _ = std::fs::remove_dir(format!("/{OLD_ROOT_DIR}"));

    Ok(())
}

fn check(operation: &str, rc: libc::c_int) -> Result<()> {
    if rc != 0 {
        return Err(Error::Syscall {
            operation: operation.to_string(),
            code: rc as i64,
        });
    }
    Ok(())
}
