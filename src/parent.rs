//! Parent-side launch orchestration.
//!
//! One `run` invocation flows through here: resolve the rootfs (pulling
//! the image if needed), unshare the parent namespaces, spawn the child
//! initializer inside fresh PID/net namespaces, register the container,
//! tee its output, attach the cgroup, bring up networking, wait, and
//! clean up in reverse order on every exit path.
//!
//! Cgroup and network failures are demoted to warnings: the container
//! must run even when resource limits or the veth pair cannot be set up.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use crate::cgroup::CgroupManager;
use crate::config::RunConfig;
use crate::constants::{CGROUP_ROOT, TEE_JOIN_TIMEOUT};
use crate::error::{Error, Result};
use crate::image::ImageManager;
use crate::network::NetworkManager;
use crate::platform::Platform;
use crate::reference::ImageRef;
use crate::state::{self, ContainerState, ContainerStatus};
use crate::store::ContainerStore;

/// Runs one container end-to-end and returns the exit code to pass
/// through to the caller.
pub fn run(platform: Platform, config: RunConfig) -> Result<i32> {
    let rootfs = resolve_rootfs(&config)?;

    if config.has_resource_limits() && !platform.is_linux() {
        warn!("resource limits (--memory, --cpu) are only supported on Linux");
    }
    if config.network_enabled && !platform.is_linux() {
        warn!("network namespace (--net) is only supported on Linux");
    }

    platform.setup_parent()?;

    let child_argv = platform.build_child_command(&rootfs, &config.command, config.network_enabled)?;

    // The id is fixed before anything is created so the state record, the
    // cgroup directory, and the veth device all share it.
    let container_id = state::generate_id();

    let cgroup = if config.has_resource_limits() && platform.is_linux() {
        setup_cgroup(&config, &container_id)
    } else {
        None
    };

    let result = supervise(platform, &config, &rootfs, &container_id, &child_argv, cgroup.as_ref());

    if let Some(cgroup) = cgroup {
        cgroup.close();
    }

    result
}

/// Spawns and supervises the child process. The cgroup is created by the
/// caller (it outlives this function); the network manager is created and
/// torn down here, keeping teardown in reverse setup order.
fn supervise(
    platform: Platform,
    config: &RunConfig,
    rootfs: &str,
    container_id: &str,
    child_argv: &[String],
    cgroup: Option<&CgroupManager>,
) -> Result<i32> {
    let store = ContainerStore::new();

    let mut child = Command::new(&child_argv[0])
        .args(&child_argv[1..])
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let state = ContainerState::create(
        container_id.to_string(),
        rootfs.to_string(),
        config.image.clone(),
        config.command.clone(),
        child.id(),
    );
    if let Err(e) = store.register(&state) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e);
    }
    eprintln!("Container {} started (PID {})", state.id, state.pid);

    let container_dir = store.container_dir(&state.id);
    let stdout_tee = tee_stream(
        child.stdout.take(),
        std::io::stdout(),
        container_dir.join("stdout.log"),
    );
    let stderr_tee = tee_stream(
        child.stderr.take(),
        std::io::stderr(),
        container_dir.join("stderr.log"),
    );

    // Attach after spawn: cgroup.procs needs the PID. The child may run
    // briefly outside the limits; that race is accepted.
    if let Some(cgroup) = cgroup
        && let Err(e) = cgroup.add_process(state.pid)
    {
        warn!("failed to add process to cgroup: {e}");
    }

    let mut network = None;
    if config.network_enabled && platform.is_linux() {
        let mut manager = NetworkManager::new(&state.id);
        match manager.setup(state.pid) {
            Ok(()) => network = Some(manager),
            Err(e) => {
                warn!("failed to set up container networking: {e}");
                manager.close();
            }
        }
    }

    let wait_result = child.wait();

    if let Some(tee) = stdout_tee {
        tee.join(TEE_JOIN_TIMEOUT);
    }
    if let Some(tee) = stderr_tee {
        tee.join(TEE_JOIN_TIMEOUT);
    }

    if let Some(mut network) = network {
        network.close();
    }

    match wait_result {
        Ok(status) => {
            let code = exit_code(status);
            store.update_status(&state.id, ContainerStatus::Exited, Some(code))?;
            Ok(code)
        }
        Err(e) => {
            let _ = store.update_status(&state.id, ContainerStatus::Exited, Some(1));
            Err(Error::Io(e))
        }
    }
}

/// Resolves the rootfs path: pull the image when `--image` was given,
/// otherwise take the supplied path.
fn resolve_rootfs(config: &RunConfig) -> Result<String> {
    match &config.image {
        Some(image) => {
            let reference = ImageRef::parse(image)?;
            let manager = ImageManager::new()?;
            // The only async boundary in the runtime; everything after the
            // pull is ordinary blocking control flow.
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let rootfs = runtime.block_on(manager.pull(&reference))?;
            Ok(rootfs.to_string_lossy().into_owned())
        }
        None => config
            .rootfs
            .clone()
            .ok_or_else(|| Error::Config("either --image or a rootfs path is required".to_string())),
    }
}

/// Creates and configures the cgroup; any failure warns and disables
/// limits for this run.
fn setup_cgroup(config: &RunConfig, container_id: &str) -> Option<CgroupManager> {
    let cgroup = CgroupManager::new(std::path::Path::new(CGROUP_ROOT), container_id);
    let configured = (|| -> Result<()> {
        cgroup.create()?;
        if let Some(bytes) = config.memory_bytes {
            cgroup.set_memory_limit(bytes)?;
        }
        if let Some(percent) = config.cpu_percent {
            cgroup.set_cpu_limit(percent)?;
        }
        Ok(())
    })();

    match configured {
        Ok(()) => Some(cgroup),
        Err(e) => {
            warn!("failed to configure cgroups: {e}");
            cgroup.close();
            None
        }
    }
}

// =============================================================================
// Output Tee
// =============================================================================

/// A spawned tee thread plus its completion signal.
struct TeeHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

impl TeeHandle {
    /// Waits up to `timeout` for the thread to drain its pipe; if it is
    /// still blocked past the deadline it is left detached.
    fn join(self, timeout: Duration) {
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => {
                let _ = self.thread.join();
            }
        }
    }
}

/// Forwards everything read from `input` to both the terminal stream and
/// a log file until EOF. Byte order is preserved within the stream.
fn tee_stream<R, W>(input: Option<R>, mut terminal: W, log_path: PathBuf) -> Option<TeeHandle>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let mut input = input?;
    let (done_tx, done_rx) = mpsc::channel();

    let thread = std::thread::spawn(move || {
        // Holding the sender until the loop ends is what signals `done`.
        let _done = done_tx;
        let mut log = match std::fs::File::create(&log_path) {
            Ok(file) => file,
            Err(e) => {
                warn!("cannot create log file {}: {e}", log_path.display());
                return;
            }
        };
        let mut buffer = [0u8; 4096];
        loop {
            match input.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let _ = terminal.write_all(&buffer[..n]);
                    let _ = terminal.flush();
                    let _ = log.write_all(&buffer[..n]);
                    let _ = log.flush();
                }
            }
        }
    });

    Some(TeeHandle {
        thread,
        done: done_rx,
    })
}

/// Maps an exit status to a code, following the shell convention of
/// 128+N for signal deaths.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}
