//! Container lifecycle commands: list, stop, logs, rm.

use std::fs;
use std::io::Write;
use std::time::Instant;

use tracing::warn;

use crate::constants::{STOP_POLL_INTERVAL, STOP_TIMEOUT};
use crate::error::Result;
use crate::state::ContainerStatus;
use crate::store::{ContainerStore, is_process_alive};

/// Lifecycle operations over the container store.
pub struct Lifecycle {
    store: ContainerStore,
}

impl Lifecycle {
    /// Uses the default store location.
    pub fn new() -> Self {
        Self {
            store: ContainerStore::new(),
        }
    }

    /// Uses a specific store (tests point this at a temp directory).
    pub fn with_store(store: ContainerStore) -> Self {
        Self { store }
    }

    /// Prints a table of all known containers.
    pub fn list(&self) -> Result<()> {
        let containers = self.store.list_all()?;
        if containers.is_empty() {
            println!("No containers found.");
            return Ok(());
        }

        println!(
            "{:<10} {:<8} {:<20} {:<10} {}",
            "ID", "PID", "IMAGE", "STATUS", "STARTED"
        );
        for container in containers {
            let image = container
                .image
                .as_deref()
                .unwrap_or(&container.rootfs);
            let image = truncate(image, 20);

            let status = match (container.status, container.exit_code) {
                (ContainerStatus::Exited, Some(code)) => format!("exited({code})"),
                (status, _) => status.to_string(),
            };

            let pid = if container.status == ContainerStatus::Running {
                container.pid.to_string()
            } else {
                "-".to_string()
            };

            println!(
                "{:<10} {:<8} {:<20} {:<10} {}",
                container.id, pid, image, status, container.start_time
            );
        }
        Ok(())
    }

    /// Stops a running container: SIGTERM, a grace period, then SIGKILL.
    pub fn stop(&self, id: &str) -> Result<()> {
        let state = self.store.get(id)?;
        if state.status != ContainerStatus::Running {
            eprintln!(
                "Container {id} is not running (status: {})",
                state.status
            );
            return Ok(());
        }

        if !is_process_alive(state.pid) {
            self.store
                .update_status(id, ContainerStatus::Exited, None)?;
            println!("Container {id} is no longer running.");
            return Ok(());
        }

        println!("Stopping container {id} (PID {})...", state.pid);
        send_signal(state.pid, libc::SIGTERM);

        let deadline = Instant::now() + STOP_TIMEOUT;
        while is_process_alive(state.pid) && Instant::now() < deadline {
            std::thread::sleep(STOP_POLL_INTERVAL);
        }

        if is_process_alive(state.pid) {
            eprintln!("Container did not stop gracefully, forcing...");
            send_signal(state.pid, libc::SIGKILL);
        }

        self.store
            .update_status(id, ContainerStatus::Stopped, None)?;
        println!("Container {id} stopped.");
        Ok(())
    }

    /// Prints the captured stdout to stdout and stderr to stderr.
    pub fn logs(&self, id: &str) -> Result<()> {
        // Surface not-found before looking at log files.
        self.store.get(id)?;

        let stdout_log = self.store.stdout_log(id);
        let stderr_log = self.store.stderr_log(id);

        let mut printed = false;
        if stdout_log.exists() {
            let bytes = fs::read(&stdout_log)?;
            std::io::stdout().write_all(&bytes)?;
            printed = true;
        }
        if stderr_log.exists() {
            let bytes = fs::read(&stderr_log)?;
            if !bytes.is_empty() {
                std::io::stderr().write_all(&bytes)?;
            }
            printed = true;
        }

        if !printed {
            println!("No logs available for container {id}");
        }
        Ok(())
    }

    /// Removes a container's state and logs; refuses while it runs.
    pub fn rm(&self, id: &str) -> Result<()> {
        self.store.remove(id)?;
        println!("Removed container {id}");
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.len() > max {
        format!("{}...", &value[..max - 3])
    } else {
        value.to_string()
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("failed to signal PID {pid}: {err}");
        }
    }
}

#[cfg(not(unix))]
fn send_signal(pid: u32, _signal: i32) {
    warn!("cannot signal PID {pid}: unsupported on this platform");
}
