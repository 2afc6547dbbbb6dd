use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Result;
use tracing::debug;

use crate::errors::BootstrapError;

/// Everything needed to start the target application.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub entrypoint: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables overriding the inherited process environment.
    pub env: Vec<(OsString, OsString)>,
    /// Trust the environment as built; never re-check dependency freshness
    /// at launch time.
    pub no_sync: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub code: i32,
}

/// Terminal step of the pipeline, modeled as a trait so orchestration tests
/// can observe launches without spawning real processes.
pub trait Launcher {
    /// Run the entrypoint to completion and report its exit status.
    ///
    /// # Errors
    ///
    /// `LaunchError` when the entrypoint is missing or not executable.
    fn launch(&self, spec: &LaunchSpec) -> Result<LaunchOutcome>;
}

/// Spawns the entrypoint as a child process with inherited stdio. The child
/// shares this process's group, so terminal-delivered signals reach it and
/// no orphan survives an aborted supervisor.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    env_bin: PathBuf,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(env_bin: impl Into<PathBuf>) -> Self {
        Self {
            env_bin: env_bin.into(),
        }
    }

    /// Explicit path entrypoints are taken as written; bare names resolve
    /// through the environment's `bin/` first, falling back to PATH lookup
    /// (which also prefers the environment, by construction of the composed
    /// path).
    fn resolve(&self, entrypoint: &str) -> PathBuf {
        let as_path = Path::new(entrypoint);
        if as_path.components().count() > 1 {
            return as_path.to_path_buf();
        }
        let candidate = self.env_bin.join(entrypoint);
        if candidate.is_file() {
            candidate
        } else {
            as_path.to_path_buf()
        }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<LaunchOutcome> {
        let program = self.resolve(&spec.entrypoint);
        debug!(program = %program.display(), no_sync = spec.no_sync, "launching entrypoint");

        let mut command = Command::new(&program);
        command.args(&spec.args).current_dir(&spec.cwd);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                anyhow::Error::from(BootstrapError::Launch(format!(
                    "{}: {err}",
                    program.display()
                )))
            }
            _ => anyhow::Error::from(err),
        })?;
        let status = child.wait()?;
        Ok(LaunchOutcome {
            code: exit_code(&status),
        })
    }
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
