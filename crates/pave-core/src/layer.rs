use std::collections::HashSet;

use anyhow::{bail, Result};
use pave_domain::{Lockfile, Manifest};
use tracing::info;

use crate::{
    env::Environment,
    install::{InstallMode, InstallOptions, InstallReport, Installer},
};

/// A named install phase with a declared cache-key scope.
#[derive(Clone, Copy, Debug)]
pub struct Phase {
    pub name: &'static str,
    pub mode: InstallMode,
    /// Whether this phase is allowed to publish dependency cache entries.
    pub writes_dependency_cache: bool,
}

/// The build is exactly two ordered phases. The split is the entire caching
/// story: the dependency layer keys off the lockfile alone, so an
/// application-code-only rebuild replays phase one as pure cache hits and
/// pays only for phase two.
pub const PHASES: [Phase; 2] = [
    Phase {
        name: "dependencies",
        mode: InstallMode::DepsOnly,
        writes_dependency_cache: true,
    },
    Phase {
        name: "project",
        mode: InstallMode::Full,
        writes_dependency_cache: false,
    },
];

#[derive(Clone, Debug, Default)]
pub struct LayerReport {
    pub phases: Vec<(String, InstallReport)>,
}

impl LayerReport {
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.phases.iter().map(|(_, report)| report.cache_hits).sum()
    }

    #[must_use]
    pub fn cache_writes(&self) -> usize {
        self.phases
            .iter()
            .map(|(_, report)| report.cache_writes.len())
            .sum()
    }

    #[must_use]
    pub fn installed(&self) -> usize {
        self.phases
            .iter()
            .map(|(_, report)| report.installed.len())
            .sum()
    }
}

/// Run both install phases in order against the same environment and cache.
///
/// Fail-fast: if the dependency phase errors, the project phase never runs.
/// The composer also enforces the layering invariant: a phase whose scope
/// forbids dependency-cache writes must not have published any.
///
/// # Errors
///
/// Propagates installer failures, plus an internal error if a phase violated
/// its declared cache scope.
pub fn compose_layers(
    installer: &Installer<'_>,
    manifest: &Manifest,
    lockfile: &Lockfile,
    env: &Environment,
    options: &InstallOptions,
) -> Result<LayerReport> {
    let mut report = LayerReport::default();
    let mut dependency_keys: HashSet<String> = HashSet::new();

    for phase in PHASES {
        let phase_options = options.with_mode(phase.mode);
        let phase_report = installer.install(manifest, lockfile, env, &phase_options)?;
        info!(
            phase = phase.name,
            installed = phase_report.installed.len(),
            cache_hits = phase_report.cache_hits,
            cache_writes = phase_report.cache_writes.len(),
            "install phase complete"
        );

        if phase.writes_dependency_cache {
            dependency_keys.extend(
                phase_report
                    .cache_writes
                    .iter()
                    .map(|key| key.as_str().to_string()),
            );
        } else if let Some(key) = phase_report
            .cache_writes
            .iter()
            .find(|key| dependency_keys.contains(key.as_str()))
        {
            bail!(
                "phase {} rewrote dependency cache entry {key}; the project layer must leave the dependency layer untouched",
                phase.name
            );
        }

        report.phases.push((phase.name.to_string(), phase_report));
    }

    Ok(report)
}
