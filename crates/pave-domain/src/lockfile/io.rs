use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use semver::Version;
use sha2::{Digest, Sha256};
use toml_edit::{DocumentMut, Item, Table};

use super::types::{LockedDependency, Lockfile, LOCK_VERSION};

impl Lockfile {
    /// Parse a `pave.lock` snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is not valid TOML,
    /// declares an unsupported lock version, or pins a malformed entry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read lockfile {}", path.display()))?;
        let digest = hex::encode(Sha256::digest(contents.as_bytes()));
        let doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("failed to parse lockfile {}", path.display()))?;

        let version = doc
            .get("version")
            .and_then(Item::as_integer)
            .ok_or_else(|| anyhow!("lockfile {} has no version field", path.display()))?;
        if version != LOCK_VERSION {
            return Err(anyhow!(
                "lockfile {} has unsupported version {version} (expected {LOCK_VERSION})",
                path.display()
            ));
        }

        let package = doc
            .get("package")
            .and_then(Item::as_str)
            .map(str::to_string);
        let manifest_fingerprint = doc
            .get("manifest_fingerprint")
            .and_then(Item::as_str)
            .map(str::to_string);

        let mut dependencies = Vec::new();
        if let Some(tables) = doc.get("dependency").and_then(Item::as_array_of_tables) {
            for table in tables {
                dependencies.push(read_dependency(table, &path)?);
            }
        }

        Ok(Self {
            path,
            version,
            package,
            manifest_fingerprint,
            dependencies,
            digest,
        })
    }
}

fn read_dependency(table: &Table, path: &Path) -> Result<LockedDependency> {
    let name = entry_str(table, "name", path)?;
    let version_raw = entry_str(table, "version", path)?;
    let version = Version::parse(&version_raw).with_context(|| {
        format!(
            "invalid pinned version {version_raw:?} for {name} in {}",
            path.display()
        )
    })?;
    let sha256 = entry_str(table, "sha256", path)?;
    if sha256.len() != 64 || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "invalid sha256 for {name} in {}: {sha256:?}",
            path.display()
        ));
    }
    let filename = entry_str(table, "filename", path)?;
    let dev = table.get("dev").and_then(Item::as_bool).unwrap_or(false);
    Ok(LockedDependency {
        name,
        version,
        sha256: sha256.to_ascii_lowercase(),
        filename,
        dev,
    })
}

fn entry_str(table: &Table, key: &str, path: &Path) -> Result<String> {
    table
        .get(key)
        .and_then(Item::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!(
                "lockfile {} has a dependency entry missing {key}",
                path.display()
            )
        })
}
