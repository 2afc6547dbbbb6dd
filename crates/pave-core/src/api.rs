use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info};

use pave_domain::{Lockfile, Manifest, LOCK_FILE_NAME, MANIFEST_FILE_NAME};

use crate::{
    env::Environment,
    errors::BootstrapError,
    install::{InstallOptions, Installer, LinkMode},
    layer::{compose_layers, LayerReport},
    outcome::ExecutionOutcome,
    runtime::launch::{LaunchSpec, Launcher, ProcessLauncher},
    runtime::paths::launch_env,
    store::{default_cache_root, FsArtifactCache},
};

/// One build-and-run invocation.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub project_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub entrypoint: String,
    pub args: Vec<String>,
    pub frozen: bool,
    pub no_dev: bool,
    pub compile_bytecode: bool,
    pub link_mode: LinkMode,
    /// Skip the bootstrap entirely and trust the existing environment.
    pub no_sync: bool,
}

/// Bootstrap the environment (unless `no_sync`) and launch the entrypoint
/// inside it, surfacing the child's exit code in the outcome details.
///
/// # Errors
///
/// Any [`BootstrapError`] from the pipeline; launch failures distinct from
/// application exit codes.
pub fn run_project(request: &RunRequest) -> Result<ExecutionOutcome> {
    let env = Environment::at(request.project_dir.join(".pave").join("env"));
    let launcher = ProcessLauncher::new(env.bin_dir());
    run_with_launcher(request, &launcher)
}

pub(crate) fn run_with_launcher(
    request: &RunRequest,
    launcher: &dyn Launcher,
) -> Result<ExecutionOutcome> {
    let manifest_path = request.project_dir.join(MANIFEST_FILE_NAME);
    if !manifest_path.is_file() {
        return Err(BootstrapError::ConfigMissing(format!(
            "manifest {} not found",
            manifest_path.display()
        ))
        .into());
    }
    let lock_path = request.project_dir.join(LOCK_FILE_NAME);
    if !lock_path.is_file() {
        return Err(BootstrapError::ConfigMissing(format!(
            "lockfile {} not found (resolution is out of scope; supply a pinned snapshot)",
            lock_path.display()
        ))
        .into());
    }

    let manifest = Manifest::load(&manifest_path)?;
    let lockfile = Lockfile::load(&lock_path)?;

    let env = Environment::at(request.project_dir.join(".pave").join("env"));
    if !request.no_sync {
        if let Some(receipt) = env.receipt() {
            if receipt.lock_digest != lockfile.digest {
                debug!("lockfile changed since the last build; resetting the environment");
                crate::fs::remove_dir_if_present(env.root()).map_err(|err| {
                    BootstrapError::InstallIo {
                        path: env.root().to_path_buf(),
                        message: format!("{err:#}"),
                    }
                })?;
            }
        }
    }
    let layers = if request.no_sync {
        debug!("no_sync requested; trusting the existing environment");
        None
    } else {
        let cache_root = request
            .cache_dir
            .clone()
            .unwrap_or_else(default_cache_root);
        let cache = FsArtifactCache::at(cache_root);
        let installer = Installer::new(&cache, &request.project_dir);
        let options = InstallOptions {
            frozen: request.frozen,
            no_dev: request.no_dev,
            compile_bytecode: request.compile_bytecode,
            link_mode: request.link_mode,
            ..InstallOptions::default()
        };
        let report = compose_layers(&installer, &manifest, &lockfile, &env, &options)?;
        info!(
            installed = report.installed(),
            cache_hits = report.cache_hits(),
            cache_writes = report.cache_writes(),
            "environment ready"
        );
        Some(report)
    };

    let spec = LaunchSpec {
        entrypoint: request.entrypoint.clone(),
        args: request.args.clone(),
        cwd: request.project_dir.clone(),
        env: launch_env(&env),
        no_sync: true,
    };
    let outcome = launcher.launch(&spec)?;

    Ok(ExecutionOutcome::success(
        format!("{} exited with code {}", request.entrypoint, outcome.code),
        json!({
            "exit_code": outcome.code,
            "environment": env.root().display().to_string(),
            "lock_digest": lockfile.digest,
            "build": build_details(layers.as_ref()),
        }),
    ))
}

fn build_details(layers: Option<&LayerReport>) -> serde_json::Value {
    match layers {
        None => json!({ "skipped": true }),
        Some(report) => json!({
            "skipped": false,
            "installed": report.installed(),
            "cache_hits": report.cache_hits(),
            "cache_writes": report.cache_writes(),
        }),
    }
}
