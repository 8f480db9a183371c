//! # jcontainer
//!
//! A minimal OCI-compatible container runtime. It pulls images straight
//! from a Docker v2 registry, flattens their layers into a cached rootfs,
//! and runs a command inside a process isolated with Linux namespaces,
//! with optional cgroup v2 resource limits and veth networking. On
//! non-Linux hosts it degrades to chroot-based filesystem isolation so
//! the tool remains usable for development.
//!
//! # Architecture
//!
//! ```text
//!  run ──► parent ──► image ──► registry (token / manifest / blobs)
//!            │           └────► extract  (gzip tar + whiteouts)
//!            │
//!            ├─ platform::setup_parent     unshare(NEWNS | NEWUTS)
//!            ├─ cgroup                     /sys/fs/cgroup/jcontainer/<id>
//!            ├─ spawn: unshare --pid [--net] --fork <self> child ...
//!            │     └─► child ──► platform::setup_filesystem (pivot_root)
//!            │                    └─► exec user command
//!            ├─ network                    veth-<id> ↔ eth0
//!            └─ store                      ~/.jcontainer/containers/<id>
//!
//!  list / stop / logs / rm ──► lifecycle ──► store
//! ```
//!
//! The launch is a two-stage parent/child handoff: a PID namespace only
//! applies to processes forked after `unshare`, so the parent re-executes
//! this same binary under `unshare --pid --fork` and the re-executed
//! `child` mode finishes the job as PID 1 of the new namespace.
//!
//! # Container tracking
//!
//! Containers persist across invocations as one directory each under
//! `~/.jcontainer/containers/`, holding pretty-printed metadata plus the
//! captured stdout/stderr. Status is reconciled against the OS process
//! table on read, so a record left `running` by a crashed parent flips to
//! `exited` the next time anything lists it.

mod cgroup;
mod child;
mod config;
mod constants;
mod error;
mod extract;
mod image;
mod lifecycle;
mod network;
mod parent;
mod platform;
mod reference;
mod registry;
mod state;
mod store;
mod syscall;

pub use cgroup::CgroupManager;
pub use child::run as run_child;
pub use config::{RunConfig, parse_cpu, parse_memory};
pub use error::{Error, Result};
pub use extract::extract_layer;
pub use image::{ImageManager, default_cache_dir};
pub use lifecycle::Lifecycle;
pub use network::NetworkManager;
pub use parent::run as run_container;
pub use platform::Platform;
pub use reference::ImageRef;
pub use registry::{Manifest, RegistryClient, select_platform_digest};
pub use state::{ContainerState, ContainerStatus, generate_id};
pub use store::{ContainerStore, default_base_dir, is_process_alive};
