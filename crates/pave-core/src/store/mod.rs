mod fs_cache;

use std::{env, fmt, path::PathBuf};

use anyhow::Result;
use semver::Version;
use sha2::{Digest, Sha256};

pub use fs_cache::FsArtifactCache;

pub const CACHE_PATH_VAR: &str = "PAVE_CACHE_PATH";

/// Content-derived lookup key for an installed package artifact.
///
/// Derivation covers everything that changes the installed bytes: package
/// identity, pinned version, artifact digest, and build-relevant
/// configuration. Identical inputs hit identical keys regardless of
/// invocation order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn derive(
        name: &str,
        version: &Version,
        artifact_sha256: &str,
        compile_bytecode: bool,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(version.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(artifact_sha256.as_bytes());
        hasher.update(b"\0");
        hasher.update(if compile_bytecode { b"pyc" } else { b"raw" });
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable, content-addressed storage for installed package trees.
///
/// Injected into the installer so tests can substitute an in-memory fake.
/// Entries are append-only: a published key is never rewritten, and a store
/// racing another writer on the same key is harmless because the contents
/// are byte-equivalent.
pub trait ArtifactCache {
    /// Look up a previously installed tree. `None` is a miss.
    fn fetch(&self, key: &CacheKey) -> Option<PathBuf>;

    /// Publish `staged` (a fully populated tree) under `key`, returning the
    /// durable location. Must be atomic: a partially written entry must never
    /// be visible as a hit.
    fn store(&self, key: &CacheKey, staged: &std::path::Path) -> Result<PathBuf>;
}

/// Root directory for the on-disk cache: `PAVE_CACHE_PATH` override first,
/// then the platform cache directory, then a dot-directory fallback.
#[must_use]
pub fn default_cache_root() -> PathBuf {
    if let Some(path) = env::var_os(CACHE_PATH_VAR) {
        return PathBuf::from(path);
    }
    dirs_next::cache_dir()
        .map(|base| base.join("pave"))
        .unwrap_or_else(|| PathBuf::from(".pave-cache"))
}
