use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::install::LinkMode;

/// Recursively copy `src` into `dst`, creating directories as needed.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields children of its root");
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Materialize `src` into `dst` honoring the requested link mode. Hardlinking
/// falls back to a plain copy per file when the filesystem refuses the link
/// (different device, unsupported).
pub(crate) fn link_tree(src: &Path, dst: &Path, mode: LinkMode) -> Result<()> {
    match mode {
        LinkMode::Copy => copy_tree(src, dst),
        LinkMode::Hardlink => {
            for entry in WalkDir::new(src) {
                let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
                let rel = entry
                    .path()
                    .strip_prefix(src)
                    .expect("walkdir yields children of its root");
                let target = dst.join(rel);
                if entry.file_type().is_dir() {
                    fs::create_dir_all(&target)
                        .with_context(|| format!("failed to create {}", target.display()))?;
                } else {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    if target.exists() {
                        continue;
                    }
                    if fs::hard_link(entry.path(), &target).is_err() {
                        fs::copy(entry.path(), &target).with_context(|| {
                            format!(
                                "failed to copy {} to {}",
                                entry.path().display(),
                                target.display()
                            )
                        })?;
                    }
                }
            }
            Ok(())
        }
    }
}

/// Atomically publish a staged directory at `dst` via rename. A concurrent
/// publisher winning the race is fine: entries are content-addressed, so the
/// existing tree is byte-equivalent and the staged copy is simply discarded.
pub(crate) fn publish_dir(staged: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match fs::rename(staged, dst) {
        Ok(()) => Ok(()),
        Err(_) if dst.exists() => {
            let _ = fs::remove_dir_all(staged);
            Ok(())
        }
        Err(err) => Err(err).with_context(|| {
            format!(
                "failed to publish {} as {}",
                staged.display(),
                dst.display()
            )
        }),
    }
}

pub(crate) fn remove_dir_if_present(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

#[cfg(unix)]
pub(crate) fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
