//! Tests for layer extraction: whiteouts, permissions, and path
//! traversal containment.

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use jcontainer::extract_layer;
use tempfile::TempDir;

// =============================================================================
// Layer Builders
// =============================================================================

/// One entry of a synthetic layer.
enum Entry<'a> {
    File { name: &'a str, contents: &'a [u8], mode: u32 },
    Dir { name: &'a str },
    Symlink { name: &'a str, target: &'a str },
}

/// Writes a path directly into a GNU header's name field, bypassing
/// `tar`'s path-traversal validation so malicious fixtures (e.g. paths
/// containing `..`) can be constructed for the containment tests below.
fn set_raw_name(header: &mut tar::Header, name: &str) {
    let gnu = header.as_gnu_mut().unwrap();
    let bytes = name.as_bytes();
    gnu.name[..bytes.len()].copy_from_slice(bytes);
    for b in &mut gnu.name[bytes.len()..] {
        *b = 0;
    }
}

/// Builds a gzipped tar layer on disk and returns its path.
fn build_layer(dir: &Path, entries: &[Entry]) -> std::path::PathBuf {
    let layer_path = dir.join("layer.tar.gz");
    let file = fs::File::create(&layer_path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        match entry {
            Entry::File { name, contents, mode } => {
                let mut header = tar::Header::new_gnu();
                header.set_size(contents.len() as u64);
                header.set_mode(*mode);
                header.set_entry_type(tar::EntryType::Regular);
                set_raw_name(&mut header, name);
                header.set_cksum();
                builder.append(&header, *contents).unwrap();
            }
            Entry::Dir { name } => {
                let mut header = tar::Header::new_gnu();
                header.set_size(0);
                header.set_mode(0o755);
                header.set_entry_type(tar::EntryType::Directory);
                header.set_cksum();
                builder.append_data(&mut header, name, &[][..]).unwrap();
            }
            Entry::Symlink { name, target } => {
                let mut header = tar::Header::new_gnu();
                header.set_size(0);
                header.set_mode(0o777);
                header.set_entry_type(tar::EntryType::Symlink);
                builder
                    .append_link(&mut header, name, target)
                    .unwrap();
            }
        }
    }

    builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
    layer_path
}

fn file_entry<'a>(name: &'a str, contents: &'a str) -> Entry<'a> {
    Entry::File {
        name,
        contents: contents.as_bytes(),
        mode: 0o644,
    }
}

// =============================================================================
// Basic Extraction
// =============================================================================

#[test]
fn test_simple_extraction() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(tmp.path(), &[file_entry("hello.txt", "Hello, World!")]);
    extract_layer(&layer, &rootfs).unwrap();

    let contents = fs::read_to_string(rootfs.join("hello.txt")).unwrap();
    assert_eq!(contents, "Hello, World!");
}

#[test]
fn test_extraction_creates_parent_directories() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(tmp.path(), &[file_entry("etc/conf.d/app.conf", "x=1")]);
    extract_layer(&layer, &rootfs).unwrap();

    assert_eq!(
        fs::read_to_string(rootfs.join("etc/conf.d/app.conf")).unwrap(),
        "x=1"
    );
}

#[test]
fn test_later_layer_overwrites_earlier_file() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let lower = build_layer(tmp.path(), &[file_entry("greeting", "old")]);
    extract_layer(&lower, &rootfs).unwrap();

    let upper_dir = tmp.path().join("upper");
    fs::create_dir_all(&upper_dir).unwrap();
    let upper = build_layer(&upper_dir, &[file_entry("greeting", "new")]);
    extract_layer(&upper, &rootfs).unwrap();

    assert_eq!(fs::read_to_string(rootfs.join("greeting")).unwrap(), "new");
}

#[test]
fn test_leading_dot_slash_is_stripped() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(tmp.path(), &[file_entry("./bin/tool", "#!/bin/sh")]);
    extract_layer(&layer, &rootfs).unwrap();

    assert!(rootfs.join("bin/tool").exists());
}

#[test]
fn test_symlink_target_recorded_verbatim() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(
        tmp.path(),
        &[
            file_entry("bin/busybox", "binary"),
            Entry::Symlink {
                name: "bin/sh",
                target: "busybox",
            },
        ],
    );
    extract_layer(&layer, &rootfs).unwrap();

    let link = fs::read_link(rootfs.join("bin/sh")).unwrap();
    assert_eq!(link, Path::new("busybox"));
}

// =============================================================================
// Whiteouts
// =============================================================================

#[test]
fn test_whiteout_deletes_sibling() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();
    fs::write(rootfs.join("deleteme.txt"), "lower layer data").unwrap();

    let layer = build_layer(tmp.path(), &[file_entry(".wh.deleteme.txt", "")]);
    extract_layer(&layer, &rootfs).unwrap();

    assert!(!rootfs.join("deleteme.txt").exists());
    assert!(!rootfs.join(".wh.deleteme.txt").exists());
}

#[test]
fn test_whiteout_deletes_directory_recursively() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(rootfs.join("cache/deep")).unwrap();
    fs::write(rootfs.join("cache/deep/blob"), "data").unwrap();

    let layer = build_layer(tmp.path(), &[file_entry(".wh.cache", "")]);
    extract_layer(&layer, &rootfs).unwrap();

    assert!(!rootfs.join("cache").exists());
}

#[test]
fn test_opaque_whiteout_empties_directory() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(rootfs.join("etc")).unwrap();
    fs::write(rootfs.join("etc/old.conf"), "old").unwrap();
    fs::write(rootfs.join("etc/other.conf"), "other").unwrap();

    let layer = build_layer(tmp.path(), &[file_entry("etc/.wh..wh..opq", "")]);
    extract_layer(&layer, &rootfs).unwrap();

    assert!(rootfs.join("etc").is_dir());
    let remaining: Vec<_> = fs::read_dir(rootfs.join("etc")).unwrap().collect();
    assert!(remaining.is_empty(), "etc should be empty: {remaining:?}");
}

#[test]
fn test_whiteout_does_not_affect_later_layers() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();
    fs::write(rootfs.join("config"), "v1").unwrap();

    // Same layer first deletes, then recreates; whiteouts are only
    // authoritative at the instant they are processed.
    let layer = build_layer(
        tmp.path(),
        &[file_entry(".wh.config", ""), file_entry("config", "v2")],
    );
    extract_layer(&layer, &rootfs).unwrap();

    assert_eq!(fs::read_to_string(rootfs.join("config")).unwrap(), "v2");
}

// =============================================================================
// Permissions
// =============================================================================

#[cfg(unix)]
#[test]
fn test_permissions_mapping() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(
        tmp.path(),
        &[Entry::File {
            name: "script.sh",
            contents: b"#!/bin/sh\n",
            mode: 0o755,
        }],
    );
    extract_layer(&layer, &rootfs).unwrap();

    let mode = fs::metadata(rootfs.join("script.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

// =============================================================================
// Path Traversal Containment
// =============================================================================

#[test]
fn test_traversal_entries_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(
        tmp.path(),
        &[
            file_entry("../escape.txt", "outside"),
            file_entry("nested/../../escape2.txt", "outside"),
            file_entry("safe.txt", "inside"),
        ],
    );
    extract_layer(&layer, &rootfs).unwrap();

    // Nothing outside the rootfs was touched, the safe entry landed.
    assert!(!tmp.path().join("escape.txt").exists());
    assert!(!tmp.path().join("escape2.txt").exists());
    assert!(rootfs.join("safe.txt").exists());
}

#[test]
fn test_hardlink_source_outside_rootfs_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();
    fs::write(tmp.path().join("secret"), "host data").unwrap();

    let layer_path = tmp.path().join("layer.tar.gz");
    let file = fs::File::create(&layer_path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_size(0);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Link);
    builder
        .append_link(&mut header, "stolen", "../secret")
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap().flush().unwrap();

    extract_layer(&layer_path, &rootfs).unwrap();
    assert!(!rootfs.join("stolen").exists());
}

#[test]
fn test_directory_entries_created() {
    let tmp = TempDir::new().unwrap();
    let rootfs = tmp.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();

    let layer = build_layer(
        tmp.path(),
        &[Entry::Dir { name: "var/log" }, file_entry("var/log/app.log", "")],
    );
    extract_layer(&layer, &rootfs).unwrap();

    assert!(rootfs.join("var/log").is_dir());
}
