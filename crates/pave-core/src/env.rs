use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const RECEIPT_FILE_NAME: &str = "pave-env.json";

/// An isolated installation target: `bin/` for executables, `lib/` for
/// installed package trees. Created by the installer and mutated only by
/// install operations; reusable across builds for the same lockfile.
#[derive(Clone, Debug)]
pub struct Environment {
    root: PathBuf,
}

impl Environment {
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    #[must_use]
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    #[must_use]
    pub fn package_dir(&self, ident: &str) -> PathBuf {
        self.lib_dir().join(ident)
    }

    #[must_use]
    pub fn receipt_path(&self) -> PathBuf {
        self.root.join(RECEIPT_FILE_NAME)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Create the environment skeleton if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the directories cannot be created.
    pub fn prepare(&self) -> Result<()> {
        for dir in [self.bin_dir(), self.lib_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Read the build receipt left by the last full install, if any.
    #[must_use]
    pub fn receipt(&self) -> Option<EnvReceipt> {
        let contents = fs::read_to_string(self.receipt_path()).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Record which lockfile snapshot this environment was built from.
    ///
    /// # Errors
    ///
    /// Returns an error when the receipt cannot be written.
    pub fn write_receipt(&self, receipt: &EnvReceipt) -> Result<()> {
        let path = self.receipt_path();
        let body = serde_json::to_string_pretty(receipt)?;
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Ties an environment to the exact lockfile snapshot it was built from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvReceipt {
    pub lock_digest: String,
    pub manifest_fingerprint: String,
    pub packages: usize,
}
