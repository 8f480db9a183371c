//! Container networking via a veth pair.
//!
//! One pair per container: the host side is named `veth-<container-id>`
//! and addressed 10.0.0.1/24; the container side appears as `eth0` at
//! 10.0.0.2/24 with a default route back through the host. All operations
//! shell out to the host's `ip` and `nsenter` utilities.

use std::process::Command;

use tracing::{debug, warn};

use crate::constants::{CONTAINER_DEV, CONTAINER_IP, HOST_IP, SUBNET};
use crate::error::{Error, Result};

/// Manages the veth pair for one container.
#[derive(Debug)]
pub struct NetworkManager {
    host_dev: String,
    created: bool,
}

impl NetworkManager {
    /// Creates a manager whose host-side device is keyed by the container
    /// id, so concurrent containers never collide.
    pub fn new(container_id: &str) -> Self {
        Self {
            host_dev: format!("veth-{container_id}"),
            created: false,
        }
    }

    /// Creates the veth pair and configures both ends.
    ///
    /// `child_pid` identifies the network namespace the container side is
    /// moved into. Any command failure aborts networking (the caller
    /// continues without it).
    pub fn setup(&mut self, child_pid: u32) -> Result<()> {
        for command in self.build_setup_commands(child_pid) {
            exec(&command)?;
        }
        self.created = true;
        debug!(dev = %self.host_dev, "container networking configured");
        Ok(())
    }

    /// The fixed command sequence for bringing up the pair, in order.
    pub(crate) fn build_setup_commands(&self, child_pid: u32) -> Vec<Vec<String>> {
        let pid = child_pid.to_string();
        let ns_net = format!("--net=/proc/{pid}/ns/net");
        let host_addr = format!("{HOST_IP}{SUBNET}");
        let container_addr = format!("{CONTAINER_IP}{SUBNET}");

        vec![
            // Create the pair.
            argv(&["ip", "link", "add", &self.host_dev, "type", "veth", "peer", "name", CONTAINER_DEV]),
            // Move the container end into the child's network namespace.
            argv(&["ip", "link", "set", CONTAINER_DEV, "netns", &pid]),
            // Configure the host side.
            argv(&["ip", "addr", "add", &host_addr, "dev", &self.host_dev]),
            argv(&["ip", "link", "set", &self.host_dev, "up"]),
            // Configure the container side from outside, via nsenter.
            argv(&["nsenter", &ns_net, "ip", "addr", "add", &container_addr, "dev", CONTAINER_DEV]),
            argv(&["nsenter", &ns_net, "ip", "link", "set", CONTAINER_DEV, "up"]),
            argv(&["nsenter", &ns_net, "ip", "link", "set", "lo", "up"]),
            argv(&["nsenter", &ns_net, "ip", "route", "add", "default", "via", HOST_IP]),
        ]
    }

    /// The teardown command. Deleting the host end removes the peer
    /// automatically.
    pub(crate) fn build_cleanup_command(&self) -> Vec<String> {
        argv(&["ip", "link", "delete", &self.host_dev])
    }

    /// Tears the pair down. Safe to call when setup never ran.
    pub fn close(&mut self) {
        if !self.created {
            return;
        }
        if let Err(e) = exec(&self.build_cleanup_command()) {
            warn!("failed to clean up veth pair {}: {e}", self.host_dev);
        }
        self.created = false;
    }

    /// Host-side device name.
    pub fn host_dev(&self) -> &str {
        &self.host_dev
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn exec(command: &[String]) -> Result<()> {
    let status = Command::new(&command[0])
        .args(&command[1..])
        .status()
        .map_err(|e| Error::Network(format!("{}: {e}", command.join(" "))))?;
    if !status.success() {
        return Err(Error::Network(format!(
            "command failed (rc={}): {}",
            status.code().unwrap_or(-1),
            command.join(" ")
        )));
    }
    Ok(())
}
