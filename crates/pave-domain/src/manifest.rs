use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use semver::VersionReq;
use sha2::{Digest, Sha256};
use toml_edit::{DocumentMut, Item, Table};

pub const MANIFEST_FILE_NAME: &str = "pave.toml";
pub const LOCK_FILE_NAME: &str = "pave.lock";

const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// A single declared dependency constraint.
#[derive(Clone, Debug)]
pub struct Requirement {
    pub name: String,
    pub constraint: VersionReq,
    /// The constraint string exactly as written in the manifest.
    pub raw: String,
}

/// The application's declared dependency constraints and metadata.
///
/// Read-only input: nothing in the bootstrap pipeline ever writes it back.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub path: PathBuf,
    pub name: String,
    pub version: String,
    pub dependencies: Vec<Requirement>,
    pub dev_dependencies: Vec<Requirement>,
    /// Directory holding locked artifact archives, relative to the project root.
    pub artifact_dir: PathBuf,
}

impl Manifest {
    /// Parse a `pave.toml` manifest.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is not valid TOML, or
    /// declares a malformed package section or version constraint.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;

        let package = doc
            .get("package")
            .and_then(Item::as_table)
            .ok_or_else(|| anyhow!("manifest {} has no [package] table", path.display()))?;
        let name = required_str(package, "name", &path)?;
        let version = required_str(package, "version", &path)?;

        let dependencies = read_requirements(doc.get("dependencies"), &path)?;
        let dev_dependencies = read_requirements(doc.get("dev-dependencies"), &path)?;

        let artifact_dir = doc
            .get("artifacts")
            .and_then(Item::as_table)
            .and_then(|table| table.get("dir"))
            .and_then(Item::as_str)
            .map_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR), PathBuf::from);

        Ok(Self {
            path,
            name,
            version,
            dependencies,
            dev_dependencies,
            artifact_dir,
        })
    }

    /// Deterministic digest over the dependency-relevant manifest content.
    ///
    /// Two manifests with the same package identity and the same constraint
    /// sets fingerprint identically regardless of formatting or table order.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(b"\n");
        for req in sorted(&self.dependencies) {
            hasher.update(format!("dep:{}={}\n", req.name, req.raw));
        }
        for req in sorted(&self.dev_dependencies) {
            hasher.update(format!("dev:{}={}\n", req.name, req.raw));
        }
        hex::encode(hasher.finalize())
    }

    /// Requirements relevant to an install pass.
    #[must_use]
    pub fn requirements(&self, include_dev: bool) -> Vec<&Requirement> {
        let mut reqs: Vec<&Requirement> = self.dependencies.iter().collect();
        if include_dev {
            reqs.extend(self.dev_dependencies.iter());
        }
        reqs
    }
}

fn sorted(reqs: &[Requirement]) -> Vec<&Requirement> {
    let mut out: Vec<&Requirement> = reqs.iter().collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn required_str(table: &Table, key: &str, path: &Path) -> Result<String> {
    table
        .get(key)
        .and_then(Item::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("manifest {} is missing package.{key}", path.display()))
}

fn read_requirements(item: Option<&Item>, path: &Path) -> Result<Vec<Requirement>> {
    let Some(table) = item.and_then(Item::as_table) else {
        return Ok(Vec::new());
    };
    let mut requirements = Vec::new();
    for (name, value) in table.iter() {
        let raw = value.as_str().ok_or_else(|| {
            anyhow!(
                "dependency {name} in {} must be a version constraint string",
                path.display()
            )
        })?;
        let constraint = VersionReq::parse(raw).with_context(|| {
            format!("invalid constraint {raw:?} for {name} in {}", path.display())
        })?;
        requirements.push(Requirement {
            name: name.to_string(),
            constraint,
            raw: raw.to_string(),
        });
    }
    Ok(requirements)
}
