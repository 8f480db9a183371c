//! Child-side container initialization.
//!
//! By the time this runs the process is already inside its new
//! namespaces (on Linux, `unshare --pid --fork` re-executed the binary).
//! It finalizes the environment and hands off to the user command.

use std::process::Command;

use crate::constants::CONTAINER_HOSTNAME;
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Sets hostname and filesystem, then runs the target command with
/// inherited stdio. Returns the command's exit code.
pub fn run(platform: Platform, rootfs: &str, command: &[String]) -> Result<i32> {
    if command.is_empty() {
        return Err(Error::Config("child requires a command to run".to_string()));
    }

    platform.set_hostname(CONTAINER_HOSTNAME)?;
    platform.setup_filesystem(rootfs)?;

    let status = Command::new(&command[0]).args(&command[1..]).status()?;
    Ok(exit_code(status))
}

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
