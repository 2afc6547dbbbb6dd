use std::path::PathBuf;

/// Fatal bootstrap-phase failures. None of these are retried: every step in
/// the pipeline is deterministic and content-addressed, so a retry without a
/// root-cause change cannot succeed. Cache store failures are deliberately
/// absent; they degrade to a cache miss instead of aborting.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("lockfile does not satisfy manifest: {0}")]
    LockMismatch(String),

    #[error("integrity check failed for {name}: expected sha256 {expected}, got {actual}")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("install failed at {path}: {message}")]
    InstallIo { path: PathBuf, message: String },

    #[error("failed to launch {0}")]
    Launch(String),
}

impl BootstrapError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigMissing(_) => "config_missing",
            Self::LockMismatch(_) => "lock_mismatch",
            Self::Integrity { .. } => "integrity_error",
            Self::InstallIo { .. } => "install_io_error",
            Self::Launch(_) => "launch_error",
        }
    }

    /// Process exit code for this failure class. Distinct from each other and
    /// from ordinary application exit codes so callers can tell a broken
    /// build environment apart from the application's own failures.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigMissing(_) => 10,
            Self::LockMismatch(_) => 11,
            Self::Integrity { .. } => 12,
            Self::InstallIo { .. } => 13,
            Self::Launch(_) => 14,
        }
    }
}

/// Find the bootstrap failure in an error chain, if any.
#[must_use]
pub fn bootstrap_error(err: &anyhow::Error) -> Option<&BootstrapError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BootstrapError>())
}
