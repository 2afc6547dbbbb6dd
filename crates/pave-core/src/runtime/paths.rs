use std::{
    env,
    ffi::{OsStr, OsString},
    path::Path,
};

use crate::env::Environment;

/// Environment variable pointing child processes at the paved environment.
pub const ENV_VAR: &str = "PAVE_ENV";

/// Compose the executable search path: the environment's `bin/` comes first,
/// so a tool that exists both in the environment and on the host resolves to
/// the environment's copy. Pure function of its inputs.
#[must_use]
pub fn compose_path(env_bin: &Path, inherited: Option<&OsStr>) -> OsString {
    let mut entries = vec![env_bin.to_path_buf()];
    if let Some(inherited) = inherited {
        entries.extend(env::split_paths(inherited));
    }
    env::join_paths(entries).unwrap_or_else(|_| env_bin.as_os_str().to_os_string())
}

/// Variables handed to the launched process on top of the inherited set.
#[must_use]
pub fn launch_env(environment: &Environment) -> Vec<(OsString, OsString)> {
    let path = compose_path(
        &environment.bin_dir(),
        env::var_os("PATH").as_deref(),
    );
    vec![
        (OsString::from("PATH"), path),
        (
            OsString::from(ENV_VAR),
            environment.root().as_os_str().to_os_string(),
        ),
    ]
}
