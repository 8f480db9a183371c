//! `run` command configuration.
//!
//! Flags come before positionals; the first non-flag token ends option
//! parsing and everything from there on is positional:
//!
//! ```text
//! run [--image REF] [--net] [--memory SIZE] [--cpu PERCENT] [ROOTFS] CMD [ARGS...]
//! ```
//!
//! With `--image`, every positional belongs to CMD (the rootfs comes from
//! the image). Without it, the first positional is the rootfs and at
//! least one CMD token must follow.

use crate::error::{Error, Result};

/// Parsed configuration for one `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Explicit rootfs path; `None` when launching from an image.
    pub rootfs: Option<String>,
    /// Image reference to resolve a rootfs from.
    pub image: Option<String>,
    /// Command argv to run inside the container.
    pub command: Vec<String>,
    /// Memory limit in bytes.
    pub memory_bytes: Option<u64>,
    /// CPU limit as a percentage of one core.
    pub cpu_percent: Option<u32>,
    /// Whether to give the container its own network namespace + veth.
    pub network_enabled: bool,
}

impl RunConfig {
    /// Parses the arguments following the `run` mode token.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut image = None;
        let mut memory_bytes = None;
        let mut cpu_percent = None;
        let mut network_enabled = false;
        let mut positional: &[String] = &[];

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--image" => {
                    image = Some(flag_value(args, i, "--image")?.to_string());
                    i += 2;
                }
                "--memory" => {
                    memory_bytes = Some(parse_memory(flag_value(args, i, "--memory")?)?);
                    i += 2;
                }
                "--cpu" => {
                    cpu_percent = Some(parse_cpu(flag_value(args, i, "--cpu")?)?);
                    i += 2;
                }
                "--net" => {
                    network_enabled = true;
                    i += 1;
                }
                _ => {
                    // First non-flag token: the rest is positional.
                    positional = &args[i..];
                    break;
                }
            }
        }

        let (rootfs, command) = if image.is_some() {
            if positional.is_empty() {
                return Err(Error::Config(
                    "expected a command to run in the container".to_string(),
                ));
            }
            (None, positional.to_vec())
        } else {
            if positional.len() < 2 {
                return Err(Error::Config(format!(
                    "expected at least <rootfs> <command>, got: {positional:?}"
                )));
            }
            (
                Some(positional[0].clone()),
                positional[1..].to_vec(),
            )
        };

        Ok(Self {
            rootfs,
            image,
            command,
            memory_bytes,
            cpu_percent,
            network_enabled,
        })
    }

    /// Whether any resource limit was requested.
    pub fn has_resource_limits(&self) -> bool {
        self.memory_bytes.is_some() || self.cpu_percent.is_some()
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("{flag} requires a value")))
}

/// Parses a human-readable memory size: a decimal count with an optional
/// `k`/`m`/`g` suffix (case-insensitive, powers of 1024). The result must
/// be positive.
pub fn parse_memory(value: &str) -> Result<u64> {
    if value.is_empty() {
        return Err(Error::Config("memory value cannot be empty".to_string()));
    }

    let lower = value.to_lowercase();
    let (number_part, multiplier) = match lower.as_bytes().last().copied() {
        Some(b'k') => (&lower[..lower.len() - 1], 1024u64),
        Some(b'm') => (&lower[..lower.len() - 1], 1024 * 1024),
        Some(b'g') => (&lower[..lower.len() - 1], 1024 * 1024 * 1024),
        _ => (lower.as_str(), 1),
    };

    let count: u64 = number_part
        .parse()
        .map_err(|_| Error::Config(format!("invalid memory value: {value}")))?;
    let bytes = count
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Config(format!("memory value too large: {value}")))?;
    if bytes == 0 {
        return Err(Error::Config(format!(
            "memory must be positive, got: {value}"
        )));
    }
    Ok(bytes)
}

/// Parses the CPU percentage: a positive integer where 100 is one core.
pub fn parse_cpu(value: &str) -> Result<u32> {
    let percent: u32 = value
        .parse()
        .map_err(|_| Error::Config(format!("invalid cpu value: {value}")))?;
    if percent == 0 {
        return Err(Error::Config(format!(
            "--cpu must be positive, got: {value}"
        )));
    }
    Ok(percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags_stop_at_first_positional() {
        // A token after the rootfs that looks like a flag belongs to the
        // container command.
        let config = RunConfig::parse(&args(&["/rootfs", "/bin/echo", "--net"])).unwrap();
        assert_eq!(config.rootfs.as_deref(), Some("/rootfs"));
        assert_eq!(config.command, ["/bin/echo", "--net"]);
        assert!(!config.network_enabled);
    }

    #[test]
    fn test_image_makes_rootfs_optional() {
        let config = RunConfig::parse(&args(&["--image", "alpine:3.19", "/bin/sh"])).unwrap();
        assert_eq!(config.image.as_deref(), Some("alpine:3.19"));
        assert_eq!(config.rootfs, None);
        assert_eq!(config.command, ["/bin/sh"]);
    }

    #[test]
    fn test_missing_command_rejected() {
        assert!(RunConfig::parse(&args(&["/rootfs"])).is_err());
        assert!(RunConfig::parse(&args(&["--image", "alpine"])).is_err());
    }

    #[test]
    fn test_parse_memory_suffixes() {
        assert_eq!(parse_memory("1024").unwrap(), 1024);
        assert_eq!(parse_memory("500k").unwrap(), 500 * 1024);
        assert_eq!(parse_memory("100m").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_memory("2G").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_memory_rejects_garbage() {
        assert!(parse_memory("").is_err());
        assert!(parse_memory("abc").is_err());
        assert!(parse_memory("10x").is_err());
        assert!(parse_memory("0").is_err());
        assert!(parse_memory("0m").is_err());
    }

    #[test]
    fn test_parse_cpu_requires_positive_integer() {
        assert_eq!(parse_cpu("50").unwrap(), 50);
        assert_eq!(parse_cpu("200").unwrap(), 200);
        assert!(parse_cpu("0").is_err());
        assert!(parse_cpu("-5").is_err());
        assert!(parse_cpu("half").is_err());
    }
}
