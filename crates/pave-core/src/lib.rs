#![deny(clippy::all, warnings)]

mod api;
mod env;
mod errors;
mod fs;
mod install;
mod layer;
mod outcome;
mod runtime;
mod store;

pub use api::{run_project, RunRequest};
pub use env::{EnvReceipt, Environment};
pub use errors::{bootstrap_error, BootstrapError};
pub use install::{InstallMode, InstallOptions, InstallReport, Installer, LinkMode};
pub use layer::{compose_layers, LayerReport, Phase, PHASES};
pub use outcome::{CommandStatus, ExecutionOutcome};
pub use runtime::launch::{LaunchOutcome, LaunchSpec, Launcher, ProcessLauncher};
pub use runtime::paths::{compose_path, launch_env, ENV_VAR};
pub use store::{default_cache_root, ArtifactCache, CacheKey, FsArtifactCache, CACHE_PATH_VAR};
