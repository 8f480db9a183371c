//! Tests for run-command argument parsing.

use jcontainer::{RunConfig, parse_memory};

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Full Flag Parsing
// =============================================================================

#[test]
fn test_all_flags_before_positionals() {
    let config = RunConfig::parse(&args(&[
        "--net", "--memory", "100m", "--cpu", "50", "/rootfs", "/bin/sh",
    ]))
    .unwrap();

    assert_eq!(config.rootfs.as_deref(), Some("/rootfs"));
    assert_eq!(config.command, ["/bin/sh"]);
    assert_eq!(config.memory_bytes, Some(100 * 1024 * 1024));
    assert_eq!(config.cpu_percent, Some(50));
    assert!(config.network_enabled);
    assert_eq!(config.image, None);
}

#[test]
fn test_plain_rootfs_and_command() {
    let config = RunConfig::parse(&args(&["/rootfs", "/bin/sh", "-c", "echo hi"])).unwrap();
    assert_eq!(config.rootfs.as_deref(), Some("/rootfs"));
    assert_eq!(config.command, ["/bin/sh", "-c", "echo hi"]);
    assert!(!config.has_resource_limits());
}

#[test]
fn test_first_positional_ends_option_parsing() {
    // "--cpu" after the rootfs is an argument of the container command.
    let config = RunConfig::parse(&args(&["/rootfs", "/bin/top", "--cpu"])).unwrap();
    assert_eq!(config.command, ["/bin/top", "--cpu"]);
    assert_eq!(config.cpu_percent, None);
}

#[test]
fn test_image_flag_consumes_all_positionals_as_command() {
    let config = RunConfig::parse(&args(&["--image", "alpine:3.19", "/bin/sh", "-l"])).unwrap();
    assert_eq!(config.image.as_deref(), Some("alpine:3.19"));
    assert_eq!(config.rootfs, None);
    assert_eq!(config.command, ["/bin/sh", "-l"]);
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_rootfs_without_command_rejected() {
    assert!(RunConfig::parse(&args(&["/rootfs"])).is_err());
    assert!(RunConfig::parse(&args(&[])).is_err());
}

#[test]
fn test_image_without_command_rejected() {
    assert!(RunConfig::parse(&args(&["--image", "alpine"])).is_err());
}

#[test]
fn test_flags_without_values_rejected() {
    assert!(RunConfig::parse(&args(&["--memory"])).is_err());
    assert!(RunConfig::parse(&args(&["--cpu"])).is_err());
    assert!(RunConfig::parse(&args(&["--image"])).is_err());
}

// =============================================================================
// Memory Grammar
// =============================================================================

#[test]
fn test_memory_multipliers() {
    let cases: &[(&str, u64)] = &[
        ("1", 1),
        ("1024", 1024),
        ("500k", 500 * 1024),
        ("500K", 500 * 1024),
        ("100m", 100 * 1024 * 1024),
        ("100M", 100 * 1024 * 1024),
        ("1g", 1024 * 1024 * 1024),
        ("2G", 2 * 1024 * 1024 * 1024),
    ];
    for (input, expected) in cases {
        assert_eq!(parse_memory(input).unwrap(), *expected, "for {input}");
    }
}

#[test]
fn test_memory_must_be_positive() {
    assert!(parse_memory("0").is_err());
    assert!(parse_memory("0g").is_err());
}

#[test]
fn test_memory_rejects_malformed_values() {
    for input in ["", "k", "12q", "ten", "-5m", "1.5g"] {
        assert!(parse_memory(input).is_err(), "should reject {input}");
    }
}
