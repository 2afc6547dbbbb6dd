use std::path::PathBuf;

use semver::Version;
use serde::Serialize;

pub const LOCK_VERSION: i64 = 1;

/// One fully pinned dependency replayed by the installer.
#[derive(Clone, Debug, Serialize)]
pub struct LockedDependency {
    pub name: String,
    pub version: Version,
    /// Expected sha256 of the artifact archive, hex encoded.
    pub sha256: String,
    /// Archive file name inside the project's artifact directory.
    pub filename: String,
    /// Development-only dependency, skipped under `no_dev`.
    pub dev: bool,
}

impl LockedDependency {
    #[must_use]
    pub fn ident(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// A frozen, transitively resolved snapshot of the manifest's constraints.
///
/// The bootstrap sequencer only ever replays this snapshot; it never
/// re-resolves.
#[derive(Clone, Debug, Serialize)]
pub struct Lockfile {
    pub path: PathBuf,
    pub version: i64,
    /// Name of the project the snapshot was resolved for, when recorded.
    pub package: Option<String>,
    /// Fingerprint of the manifest the snapshot was resolved from, when recorded.
    pub manifest_fingerprint: Option<String>,
    pub dependencies: Vec<LockedDependency>,
    /// sha256 of the lockfile bytes, used to key rebuildable environments.
    pub digest: String,
}

impl Lockfile {
    pub fn find(&self, name: &str) -> Option<&LockedDependency> {
        self.dependencies.iter().find(|dep| dep.name == name)
    }
}
