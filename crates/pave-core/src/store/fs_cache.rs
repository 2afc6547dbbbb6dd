use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::fs::publish_dir;

use super::{ArtifactCache, CacheKey};

const PACKAGES_DIR: &str = "packages";
const STAGING_DIR: &str = "staging";

/// Durable on-disk cache: one directory per key under `<root>/packages/`.
/// Writes stage into `<root>/staging/` and rename-publish so a partial write
/// is never visible as a hit, and so concurrent builds sharing the cache need
/// no locking.
#[derive(Clone, Debug)]
pub struct FsArtifactCache {
    root: PathBuf,
}

impl FsArtifactCache {
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(PACKAGES_DIR).join(key.as_str())
    }

    /// Keys currently published in the cache, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.root.join(PACKAGES_DIR)) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        keys.sort();
        keys
    }
}

impl ArtifactCache for FsArtifactCache {
    fn fetch(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.entry_path(key);
        path.is_dir().then_some(path)
    }

    fn store(&self, key: &CacheKey, staged: &Path) -> Result<PathBuf> {
        let dest = self.entry_path(key);
        if dest.is_dir() {
            return Ok(dest);
        }
        let staging_root = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging_root)
            .with_context(|| format!("failed to create {}", staging_root.display()))?;
        // Stage a copy next to the final location so the publish rename stays
        // on one filesystem.
        let holding = tempfile::Builder::new()
            .prefix(key.as_str())
            .tempdir_in(&staging_root)
            .with_context(|| format!("failed to stage under {}", staging_root.display()))?;
        let staged_copy = holding.path().join("tree");
        crate::fs::copy_tree(staged, &staged_copy)?;
        publish_dir(&staged_copy, &dest)?;
        Ok(dest)
    }
}
