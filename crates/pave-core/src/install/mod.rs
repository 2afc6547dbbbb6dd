mod archive;
#[cfg(test)]
pub(crate) mod test_support;

use std::{fs, path::Path, process::Command};

use anyhow::Result;
use pave_domain::{verify_against_manifest, LockedDependency, Lockfile, Manifest};
use tracing::{debug, warn};

use crate::{
    env::{EnvReceipt, Environment},
    errors::BootstrapError,
    fs::{link_tree, make_executable, remove_dir_if_present},
    store::{ArtifactCache, CacheKey},
};

pub(crate) use archive::file_sha256;

/// Which layer an install pass materializes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallMode {
    /// Every locked dependency, but never the application's own code.
    DepsOnly,
    /// Dependencies plus the application package itself.
    Full,
}

/// How cached trees land in the environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkMode {
    #[default]
    Copy,
    Hardlink,
}

#[derive(Clone, Copy, Debug)]
pub struct InstallOptions {
    pub mode: InstallMode,
    pub frozen: bool,
    pub no_dev: bool,
    pub compile_bytecode: bool,
    pub link_mode: LinkMode,
}

impl InstallOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            mode: InstallMode::DepsOnly,
            frozen: true,
            no_dev: false,
            compile_bytecode: false,
            link_mode: LinkMode::Copy,
        }
    }
}

/// What one install pass actually did.
#[derive(Clone, Debug, Default)]
pub struct InstallReport {
    /// Dependency trees materialized into the environment by this pass.
    pub installed: Vec<String>,
    /// Dependencies already present in the environment and left untouched.
    pub already_present: usize,
    pub cache_hits: usize,
    /// Cache entries published by this pass.
    pub cache_writes: Vec<CacheKey>,
    pub skipped_dev: usize,
    pub project_installed: bool,
}

/// Replays a lockfile into an environment, consulting and populating the
/// injected cache. Never resolves anything: the lockfile is the sole source
/// of truth for what gets installed.
pub struct Installer<'a> {
    cache: &'a dyn ArtifactCache,
    project_root: &'a Path,
}

impl<'a> Installer<'a> {
    #[must_use]
    pub fn new(cache: &'a dyn ArtifactCache, project_root: &'a Path) -> Self {
        Self {
            cache,
            project_root,
        }
    }

    /// Install the pinned dependency set (and, in `Full` mode, the
    /// application package) into `env`.
    ///
    /// # Errors
    ///
    /// `LockMismatch` when `frozen` and the lockfile does not satisfy the
    /// manifest (checked before any filesystem write); `Integrity` on an
    /// artifact digest mismatch; `InstallIo` on filesystem failure.
    pub fn install(
        &self,
        manifest: &Manifest,
        lockfile: &Lockfile,
        env: &Environment,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        if options.frozen {
            let mismatches = verify_against_manifest(lockfile, manifest, !options.no_dev);
            if !mismatches.is_empty() {
                let summary = mismatches
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(BootstrapError::LockMismatch(summary).into());
            }
        }

        env.prepare()
            .map_err(|err| install_io(env.root(), &err))?;

        let mut report = InstallReport::default();
        for dep in &lockfile.dependencies {
            if dep.dev && options.no_dev {
                report.skipped_dev += 1;
                continue;
            }
            self.install_dependency(dep, manifest, env, options, &mut report)?;
        }

        if options.mode == InstallMode::Full {
            self.install_project(manifest, env, &mut report)?;
            env.write_receipt(&EnvReceipt {
                lock_digest: lockfile.digest.clone(),
                manifest_fingerprint: manifest.fingerprint(),
                packages: lockfile.dependencies.len(),
            })
            .map_err(|err| install_io(&env.receipt_path(), &err))?;
        }

        if options.compile_bytecode {
            precompile(env);
        }

        Ok(report)
    }

    fn install_dependency(
        &self,
        dep: &LockedDependency,
        manifest: &Manifest,
        env: &Environment,
        options: &InstallOptions,
        report: &mut InstallReport,
    ) -> Result<()> {
        let dest = env.package_dir(&dep.ident());
        if dest.is_dir() {
            report.already_present += 1;
            return Ok(());
        }
        let key = CacheKey::derive(&dep.name, &dep.version, &dep.sha256, options.compile_bytecode);

        // Keep the unpack staging alive until materialization is done: it is
        // the fallback source when the cache store degrades to a miss.
        let mut staging: Option<tempfile::TempDir> = None;
        let source = match self.cache.fetch(&key) {
            Some(cached) => {
                report.cache_hits += 1;
                debug!(package = %dep.ident(), key = %key, "dependency cache hit");
                cached
            }
            None => {
                let staged = self.unpack_artifact(dep, manifest)?;
                let tree = staged.path().join("tree");
                let source = match self.cache.store(&key, &tree) {
                    Ok(published) => {
                        report.cache_writes.push(key.clone());
                        published
                    }
                    Err(err) => {
                        // Caching is an optimization: degrade to an uncached
                        // install instead of failing the build.
                        warn!(package = %dep.ident(), error = %err, "cache store failed; continuing without caching");
                        tree
                    }
                };
                staging = Some(staged);
                source
            }
        };

        link_tree(&source, &dest, options.link_mode).map_err(|err| install_io(&dest, &err))?;
        self.link_bin_entries(&dest, env, options.link_mode)?;
        report.installed.push(dep.ident());
        drop(staging);
        Ok(())
    }

    /// Verify and unpack the locked artifact archive into a fresh staging
    /// directory (under `tree/`).
    fn unpack_artifact(
        &self,
        dep: &LockedDependency,
        manifest: &Manifest,
    ) -> Result<tempfile::TempDir> {
        let archive_path = self
            .project_root
            .join(&manifest.artifact_dir)
            .join(&dep.filename);
        if !archive_path.is_file() {
            return Err(BootstrapError::InstallIo {
                path: archive_path,
                message: "locked artifact archive not found".to_string(),
            }
            .into());
        }

        let actual = file_sha256(&archive_path).map_err(|err| install_io(&archive_path, &err))?;
        if !actual.eq_ignore_ascii_case(&dep.sha256) {
            return Err(BootstrapError::Integrity {
                name: dep.ident(),
                expected: dep.sha256.clone(),
                actual,
            }
            .into());
        }

        let staged = tempfile::Builder::new()
            .prefix("pave-unpack")
            .tempdir()
            .map_err(|err| BootstrapError::InstallIo {
                path: archive_path.clone(),
                message: err.to_string(),
            })?;
        archive::unpack_archive(&archive_path, &staged.path().join("tree"))
            .map_err(|err| install_io(&archive_path, &err))?;
        Ok(staged)
    }

    /// Surface a package's `bin/` entries in the environment's executables
    /// directory.
    fn link_bin_entries(&self, package_dir: &Path, env: &Environment, mode: LinkMode) -> Result<()> {
        let pkg_bin = package_dir.join("bin");
        if !pkg_bin.is_dir() {
            return Ok(());
        }
        let env_bin = env.bin_dir();
        let entries = fs::read_dir(&pkg_bin).map_err(|err| install_io(&pkg_bin, &err.into()))?;
        for entry in entries.flatten() {
            let src = entry.path();
            if !src.is_file() {
                continue;
            }
            let dest = env_bin.join(entry.file_name());
            if dest.exists() {
                fs::remove_file(&dest).map_err(|err| install_io(&dest, &err.into()))?;
            }
            match mode {
                LinkMode::Hardlink if fs::hard_link(&src, &dest).is_ok() => {}
                _ => {
                    fs::copy(&src, &dest).map_err(|err| install_io(&dest, &err.into()))?;
                }
            }
            make_executable(&dest).map_err(|err| install_io(&dest, &err))?;
        }
        Ok(())
    }

    /// The application's own layer: a local package link. Always re-runs;
    /// app code is expected to change every build, and this step touches no
    /// dependency cache entry.
    fn install_project(
        &self,
        manifest: &Manifest,
        env: &Environment,
        report: &mut InstallReport,
    ) -> Result<()> {
        let app_dir = env.package_dir(&manifest.name);
        remove_dir_if_present(&app_dir).map_err(|err| install_io(&app_dir, &err))?;

        let src = self.project_root.join("src");
        if src.is_dir() {
            crate::fs::copy_tree(&src, &app_dir.join("src"))
                .map_err(|err| install_io(&app_dir, &err))?;
        }
        let bin = self.project_root.join("bin");
        if bin.is_dir() {
            crate::fs::copy_tree(&bin, &app_dir.join("bin"))
                .map_err(|err| install_io(&app_dir, &err))?;
            self.link_bin_entries(&app_dir, env, LinkMode::Copy)?;
        }
        report.project_installed = true;
        Ok(())
    }
}

fn install_io(path: &Path, err: &anyhow::Error) -> anyhow::Error {
    BootstrapError::InstallIo {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    }
    .into()
}

/// Best-effort ahead-of-time bytecode compilation. Purely a first-run
/// latency optimization: failures are logged and ignored, and the flag only
/// matters when the environment actually ships an interpreter.
fn precompile(env: &Environment) {
    let interpreter = env.bin_dir().join("python");
    if !interpreter.is_file() {
        debug!("no interpreter in environment; skipping bytecode precompile");
        return;
    }
    match Command::new(&interpreter)
        .args(["-m", "compileall", "-q"])
        .arg(env.lib_dir())
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => debug!(%status, "bytecode precompile exited non-zero"),
        Err(err) => debug!(error = %err, "bytecode precompile failed to start"),
    }
}
