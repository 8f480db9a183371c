//! Constants for the container runtime.
//!
//! Registry endpoints, media types, on-disk layout names, and timeouts
//! live here so there are no magic values scattered through the codebase.

use std::time::Duration;

// =============================================================================
// Registry Defaults
// =============================================================================

/// Default registry host for unqualified image references.
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

/// Default namespace for single-segment image names.
pub const DEFAULT_NAMESPACE: &str = "library";

/// Default tag when none is given.
pub const DEFAULT_TAG: &str = "latest";

/// Token endpoint for Docker Hub pulls.
pub const AUTH_URL: &str = "https://auth.docker.io/token";

/// Service name presented to the token endpoint.
pub const AUTH_SERVICE: &str = "registry.docker.io";

// =============================================================================
// Manifest Media Types
// =============================================================================

/// Docker image manifest, schema 2.
pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Docker manifest list (multi-platform), schema 2.
pub const MANIFEST_LIST_V2: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

/// OCI image manifest.
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI image index (multi-platform).
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

// =============================================================================
// On-Disk Layout
// =============================================================================

/// Per-user state directory under `$HOME`.
pub const STATE_DIR: &str = ".jcontainer";

/// Image cache subdirectory.
pub const CACHE_DIR: &str = "cache";

/// Container metadata subdirectory.
pub const CONTAINERS_DIR: &str = "containers";

/// Sentinel marking a fully extracted image cache entry.
pub const COMPLETE_MARKER: &str = ".complete";

/// Per-container metadata file name.
pub const METADATA_FILE: &str = "metadata.json";

/// Captured stdout of the container process.
pub const STDOUT_LOG: &str = "stdout.log";

/// Captured stderr of the container process.
pub const STDERR_LOG: &str = "stderr.log";

// =============================================================================
// Isolation
// =============================================================================

/// Hostname set inside the UTS namespace.
pub const CONTAINER_HOSTNAME: &str = "container";

/// Directory inside the new root that briefly holds the old root
/// during the pivot.
pub const OLD_ROOT_DIR: &str = "oldrootfs";

/// Default cgroup v2 mount point.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Parent cgroup shared by all containers.
pub const CGROUP_PARENT: &str = "jcontainer";

/// cpu.max period in microseconds; the quota is expressed against this.
pub const CPU_PERIOD_USEC: u64 = 100_000;

// =============================================================================
// Networking
// =============================================================================

/// Host-side address of the veth pair.
pub const HOST_IP: &str = "10.0.0.1";

/// Container-side address of the veth pair.
pub const CONTAINER_IP: &str = "10.0.0.2";

/// Subnet suffix for both addresses.
pub const SUBNET: &str = "/24";

/// Device name inside the container's network namespace.
pub const CONTAINER_DEV: &str = "eth0";

// =============================================================================
// Timeouts
// =============================================================================

/// Grace period between SIGTERM and SIGKILL when stopping a container.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling cadence while waiting for a stopping container to exit.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Deadline for joining the output tee threads after the child exits.
pub const TEE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
