//! Layer extraction onto a rootfs.
//!
//! Applies gzip-compressed tar layers in manifest order, honoring the OCI
//! whiteout conventions used to express deletions between layers:
//!
//! - `.wh.<name>` deletes `<name>` from lower layers.
//! - `.wh..wh..opq` marks its directory opaque: every lower-layer entry in
//!   that directory is removed.
//!
//! Entries whose normalized path would land outside the rootfs are
//! silently skipped. Symlink targets are recorded verbatim; hard-link
//! sources must resolve inside the rootfs.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::{Error, Result};

/// Prefix marking a whiteout entry.
const WHITEOUT_PREFIX: &str = ".wh.";

/// File name marking an opaque directory whiteout.
const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Extracts a gzipped tar layer into the target rootfs directory.
pub fn extract_layer(layer_targz: &Path, rootfs: &Path) -> Result<()> {
    let file = fs::File::open(layer_targz)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    apply_archive(&mut archive, rootfs)
}

/// Applies every entry of an open tar archive onto the rootfs.
pub(crate) fn apply_archive<R: Read>(archive: &mut Archive<R>, rootfs: &Path) -> Result<()> {
    for entry in archive.entries().map_err(|e| Error::Extract(e.to_string()))? {
        let mut entry = entry.map_err(|e| Error::Extract(e.to_string()))?;

        let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let name = raw_name.strip_prefix("./").unwrap_or(&raw_name);
        if name.is_empty() || name == "." {
            continue;
        }

        // Path-traversal guard: entries resolving outside the rootfs are
        // dropped without error.
        let Some(target) = resolve_under(rootfs, name) else {
            continue;
        };

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file_name == OPAQUE_WHITEOUT {
            if let Some(dir) = target.parent()
                && dir.is_dir()
            {
                clear_directory(dir)?;
            }
            continue;
        }

        if let Some(victim) = file_name.strip_prefix(WHITEOUT_PREFIX) {
            if let Some(parent) = target.parent() {
                delete_recursive(&parent.join(victim));
            }
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = entry.header();
        let mode = header.mode().unwrap_or(0);
        match header.entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
                set_permissions(&target, mode);
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name()
                    .map_err(|e| Error::Extract(e.to_string()))?
                    .ok_or_else(|| Error::Extract(format!("symlink {name} has no target")))?
                    .into_owned();
                delete_recursive(&target);
                make_symlink(&link, &target)?;
            }
            EntryType::Link => {
                let link = entry
                    .link_name()
                    .map_err(|e| Error::Extract(e.to_string()))?
                    .ok_or_else(|| Error::Extract(format!("hard link {name} has no target")))?;
                let link_name = link.to_string_lossy().into_owned();
                // Same containment rule as the entry path; dangling or
                // escaping sources are skipped.
                if let Some(source) = resolve_under(rootfs, &link_name)
                    && source.exists()
                {
                    delete_recursive(&target);
                    fs::hard_link(&source, &target)?;
                }
            }
            _ => {
                let mut out = fs::File::create(&target)?;
                std::io::copy(&mut entry, &mut out)?;
                set_permissions(&target, mode);
            }
        }
    }
    Ok(())
}

/// Resolves `name` under `root` component-wise, rejecting absolute paths
/// and any `..` sequence that would climb out of the root.
fn resolve_under(root: &Path, name: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Translates the low nine mode bits to permissions, best-effort.
/// Symlinks are never chmod'd; failures on non-POSIX hosts are ignored.
fn set_permissions(path: &Path, mode: u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = path.symlink_metadata()
            && !metadata.file_type().is_symlink()
        {
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777));
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(_link: &Path, _target: &Path) -> Result<()> {
    // Symlinks in image layers cannot be represented; skip.
    Ok(())
}

/// Deletes every child of a directory, used for opaque whiteouts.
fn clear_directory(dir: &Path) -> Result<()> {
    for child in fs::read_dir(dir)? {
        let child = child?;
        delete_recursive(&child.path());
    }
    Ok(())
}

/// Best-effort recursive removal that never follows symlinks.
fn delete_recursive(path: &Path) {
    match path.symlink_metadata() {
        Ok(metadata) if metadata.is_dir() => {
            let _ = fs::remove_dir_all(path);
        }
        Ok(_) => {
            let _ = fs::remove_file(path);
        }
        Err(_) => {}
    }
}
