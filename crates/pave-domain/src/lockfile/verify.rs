use std::fmt;

use semver::Version;

use crate::manifest::Manifest;

use super::types::Lockfile;

/// Why a manifest requirement is not satisfied by the lockfile.
#[derive(Clone, Debug, PartialEq)]
pub enum MismatchKind {
    /// The requirement has no pinned entry at all.
    MissingFromLock,
    /// The pinned version falls outside the declared constraint.
    VersionConflict { locked: Version },
}

#[derive(Clone, Debug)]
pub struct LockMismatchDetail {
    pub name: String,
    pub requirement: String,
    pub kind: MismatchKind,
}

impl fmt::Display for LockMismatchDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MismatchKind::MissingFromLock => {
                write!(f, "{} ({}) is not pinned", self.name, self.requirement)
            }
            MismatchKind::VersionConflict { locked } => write!(
                f,
                "{} is pinned to {locked}, outside {}",
                self.name, self.requirement
            ),
        }
    }
}

/// Per-package frozen-mode check: every manifest requirement must be pinned
/// by the lockfile at a version inside its constraint. Extra lock entries are
/// fine (the snapshot is transitively resolved, so it is a superset of the
/// direct constraints).
#[must_use]
pub fn verify_against_manifest(
    lockfile: &Lockfile,
    manifest: &Manifest,
    include_dev: bool,
) -> Vec<LockMismatchDetail> {
    let mut mismatches = Vec::new();
    for requirement in manifest.requirements(include_dev) {
        match lockfile.find(&requirement.name) {
            None => mismatches.push(LockMismatchDetail {
                name: requirement.name.clone(),
                requirement: requirement.raw.clone(),
                kind: MismatchKind::MissingFromLock,
            }),
            Some(dep) if !requirement.constraint.matches(&dep.version) => {
                mismatches.push(LockMismatchDetail {
                    name: requirement.name.clone(),
                    requirement: requirement.raw.clone(),
                    kind: MismatchKind::VersionConflict {
                        locked: dep.version.clone(),
                    },
                });
            }
            Some(_) => {}
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::lockfile::types::LockedDependency;

    fn manifest(body: &str) -> Manifest {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pave.toml");
        fs::write(&path, body).expect("write manifest");
        Manifest::load(&path).expect("load manifest")
    }

    fn lock(entries: Vec<(&str, &str, bool)>) -> Lockfile {
        Lockfile {
            path: PathBuf::from("pave.lock"),
            version: 1,
            package: None,
            manifest_fingerprint: None,
            dependencies: entries
                .into_iter()
                .map(|(name, version, dev)| LockedDependency {
                    name: name.to_string(),
                    version: Version::parse(version).expect("version"),
                    sha256: "0".repeat(64),
                    filename: format!("{name}-{version}.tar.gz"),
                    dev,
                })
                .collect(),
            digest: "0".repeat(64),
        }
    }

    const MANIFEST: &str = "[package]\nname = \"s\"\nversion = \"0.1.0\"\n\n[dependencies]\nalpha = \"^1.2\"\n\n[dev-dependencies]\nchecker = \"^2\"\n";

    #[test]
    fn satisfied_lock_reports_nothing() {
        let manifest = manifest(MANIFEST);
        let lock = lock(vec![
            ("alpha", "1.4.0", false),
            ("checker", "2.0.1", true),
            ("transitive-extra", "0.9.0", false),
        ]);
        assert!(verify_against_manifest(&lock, &manifest, true).is_empty());
    }

    #[test]
    fn reports_missing_and_conflicting_packages_by_name() {
        let manifest = manifest(MANIFEST);
        let lock = lock(vec![("alpha", "2.0.0", false)]);
        let mismatches = verify_against_manifest(&lock, &manifest, true);
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].name, "alpha");
        assert!(matches!(
            mismatches[0].kind,
            MismatchKind::VersionConflict { .. }
        ));
        assert_eq!(mismatches[1].name, "checker");
        assert_eq!(mismatches[1].kind, MismatchKind::MissingFromLock);
    }

    #[test]
    fn dev_requirements_are_ignored_without_dev() {
        let manifest = manifest(MANIFEST);
        let lock = lock(vec![("alpha", "1.2.3", false)]);
        assert!(verify_against_manifest(&lock, &manifest, false).is_empty());
    }
}
