//! Thin, typed wrappers around the raw syscalls used for isolation.
//!
//! Every wrapper returns the raw result code; callers check for `0`.
//! `pivot_root` has no libc wrapper and goes through the generic
//! `syscall()` trampoline with an architecture-selected number.
//!
//! On non-Linux hosts only `chroot` and `chdir` are real; the rest are
//! stubs that log a diagnostic and return `-1`.

#[cfg(unix)]
use std::ffi::CString;

// =============================================================================
// Kernel Constants
// =============================================================================

/// Bind mount (`MS_BIND`).
pub const MS_BIND: libc::c_ulong = 4096;
/// Recursive mount operation (`MS_REC`).
pub const MS_REC: libc::c_ulong = 16384;
/// Private mount propagation (`MS_PRIVATE`).
pub const MS_PRIVATE: libc::c_ulong = 1 << 18;

/// Lazy unmount (`MNT_DETACH`).
pub const MNT_DETACH: libc::c_int = 2;

/// New mount namespace.
pub const CLONE_NEWNS: libc::c_int = 0x0002_0000;
/// New UTS (hostname) namespace.
pub const CLONE_NEWUTS: libc::c_int = 0x0400_0000;
/// New PID namespace.
pub const CLONE_NEWPID: libc::c_int = 0x2000_0000;
/// New network namespace.
pub const CLONE_NEWNET: libc::c_int = 0x4000_0000;

/// `pivot_root` syscall number on x86_64.
#[cfg(target_os = "linux")]
const SYS_PIVOT_ROOT_X86_64: libc::c_long = 155;
/// `pivot_root` syscall number on aarch64.
#[cfg(target_os = "linux")]
const SYS_PIVOT_ROOT_AARCH64: libc::c_long = 217;

#[cfg(unix)]
fn cstring(value: &str) -> CString {
    // Paths come from the CLI or our own layout; interior NULs cannot occur
    // in valid inputs, and an invalid one must not panic the child.
    CString::new(value).unwrap_or_default()
}

// =============================================================================
// Cross-Platform: chroot, chdir
// =============================================================================

/// Changes the root directory of the calling process.
#[cfg(unix)]
pub fn chroot(path: &str) -> libc::c_int {
    let path = cstring(path);
    unsafe { libc::chroot(path.as_ptr()) }
}

/// Changes the working directory of the calling process.
#[cfg(unix)]
pub fn chdir(path: &str) -> libc::c_int {
    let path = cstring(path);
    unsafe { libc::chdir(path.as_ptr()) }
}

#[cfg(not(unix))]
pub fn chroot(_path: &str) -> libc::c_int {
    tracing::error!("chroot is unsupported on this platform");
    -1
}

#[cfg(not(unix))]
pub fn chdir(_path: &str) -> libc::c_int {
    tracing::error!("chdir is unsupported on this platform");
    -1
}

// =============================================================================
// Linux-Only: unshare, sethostname, mount, umount2, pivot_root
// =============================================================================

#[cfg(target_os = "linux")]
mod linux {
    use super::*;

    /// Disassociates parts of the process execution context.
    pub fn unshare(flags: libc::c_int) -> libc::c_int {
        unsafe { libc::unshare(flags) }
    }

    /// Sets the hostname of the current UTS namespace.
    pub fn sethostname(name: &str) -> libc::c_int {
        let len = name.len();
        let name = cstring(name);
        unsafe { libc::sethostname(name.as_ptr(), len) }
    }

    /// Mounts a filesystem. `source`, `fstype`, and `data` may be absent,
    /// in which case NULL is passed through.
    pub fn mount(
        source: Option<&str>,
        target: &str,
        fstype: Option<&str>,
        flags: libc::c_ulong,
        data: Option<&str>,
    ) -> libc::c_int {
        let source = source.map(cstring);
        let target = cstring(target);
        let fstype = fstype.map(cstring);
        let data = data.map(cstring);
        unsafe {
            libc::mount(
                source.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
                target.as_ptr(),
                fstype.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
                flags,
                data.as_ref()
                    .map_or(std::ptr::null(), |s| s.as_ptr().cast()),
            )
        }
    }

    /// Unmounts a filesystem with flags (e.g. [`MNT_DETACH`]).
    pub fn umount2(target: &str, flags: libc::c_int) -> libc::c_int {
        let target = cstring(target);
        unsafe { libc::umount2(target.as_ptr(), flags) }
    }

    /// Swaps the root mount, placing the old root under `put_old`.
    ///
    /// Invoked through `syscall(2)`; architectures without a known number
    /// fail closed.
    pub fn pivot_root(new_root: &str, put_old: &str) -> libc::c_long {
        let number = if cfg!(target_arch = "x86_64") {
            SYS_PIVOT_ROOT_X86_64
        } else if cfg!(target_arch = "aarch64") {
            SYS_PIVOT_ROOT_AARCH64
        } else {
            tracing::error!("pivot_root is unsupported on this architecture");
            return -1;
        };
        let new_root = cstring(new_root);
        let put_old = cstring(put_old);
        unsafe { libc::syscall(number, new_root.as_ptr(), put_old.as_ptr()) }
    }
}

#[cfg(target_os = "linux")]
pub use linux::{mount, pivot_root, sethostname, umount2, unshare};

#[cfg(not(target_os = "linux"))]
mod stubs {
    fn unsupported(name: &str) -> libc::c_int {
        tracing::error!("{name} is unsupported on this platform");
        -1
    }

    pub fn unshare(_flags: libc::c_int) -> libc::c_int {
        unsupported("unshare")
    }

    pub fn sethostname(_name: &str) -> libc::c_int {
        unsupported("sethostname")
    }

    pub fn mount(
        _source: Option<&str>,
        _target: &str,
        _fstype: Option<&str>,
        _flags: libc::c_ulong,
        _data: Option<&str>,
    ) -> libc::c_int {
        unsupported("mount")
    }

    pub fn umount2(_target: &str, _flags: libc::c_int) -> libc::c_int {
        unsupported("umount2")
    }

    pub fn pivot_root(_new_root: &str, _put_old: &str) -> libc::c_long {
        unsupported("pivot_root") as libc::c_long
    }
}

#[cfg(not(target_os = "linux"))]
pub use stubs::{mount, pivot_root, sethostname, umount2, unshare};
