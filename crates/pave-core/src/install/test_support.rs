//! Shared fixture: a project with a manifest, two locked artifacts (one
//! dev-only), project sources, and a `bin/app` entrypoint.

use std::{
    fs,
    fs::File,
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};
use pave_domain::{Lockfile, Manifest};
use tempfile::TempDir;

pub(crate) fn build_archive(path: &Path, files: &[(&str, &str, u32)]) {
    let file = File::create(path).expect("create archive");
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, body, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder
            .append_data(&mut header, name, body.as_bytes())
            .expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

pub(crate) struct Fixture {
    pub(crate) _temp: TempDir,
    pub(crate) root: PathBuf,
    pub(crate) manifest: Manifest,
    pub(crate) lockfile: Lockfile,
}

impl Fixture {
    pub(crate) fn cache(&self) -> crate::store::FsArtifactCache {
        crate::store::FsArtifactCache::at(self.root.join("cache"))
    }

    pub(crate) fn env(&self, name: &str) -> crate::env::Environment {
        crate::env::Environment::at(self.root.join(name))
    }
}

pub(crate) fn fixture(alpha_pin: &str) -> Fixture {
    fixture_with_digest(alpha_pin, None)
}

/// Rewrite the fixture lock, pinning alpha at a different version. The
/// archive on disk is unchanged, so its recorded digest stays valid.
pub(crate) fn repin_alpha(root: &Path, pin: &str) {
    let artifacts = root.join("artifacts");
    let alpha_sha = super::file_sha256(&artifacts.join("alpha-1.4.0.tar.gz")).expect("digest");
    let checker_sha = super::file_sha256(&artifacts.join("checker-2.0.1.tar.gz")).expect("digest");
    fs::write(
        root.join("pave.lock"),
        format!(
            "version = 1\npackage = \"sample\"\n\n\
             [[dependency]]\nname = \"alpha\"\nversion = \"{pin}\"\nsha256 = \"{alpha_sha}\"\nfilename = \"alpha-1.4.0.tar.gz\"\n\n\
             [[dependency]]\nname = \"checker\"\nversion = \"2.0.1\"\nsha256 = \"{checker_sha}\"\nfilename = \"checker-2.0.1.tar.gz\"\ndev = true\n"
        ),
    )
    .expect("rewrite lock");
}

pub(crate) fn fixture_with_digest(alpha_pin: &str, alpha_digest: Option<&str>) -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("project");
    let artifacts = root.join("artifacts");
    fs::create_dir_all(&artifacts).expect("artifacts dir");

    fs::write(
        root.join("pave.toml"),
        "[package]\nname = \"sample\"\nversion = \"0.1.0\"\n\n[dependencies]\nalpha = \"^1.2\"\n\n[dev-dependencies]\nchecker = \"^2\"\n",
    )
    .expect("write manifest");

    let alpha_archive = artifacts.join("alpha-1.4.0.tar.gz");
    build_archive(
        &alpha_archive,
        &[
            ("lib/alpha.txt", "alpha payload", 0o644),
            ("bin/greet", "#!/bin/sh\necho env-greeting\n", 0o755),
        ],
    );
    let checker_archive = artifacts.join("checker-2.0.1.tar.gz");
    build_archive(&checker_archive, &[("lib/checker.txt", "checker", 0o644)]);

    let alpha_sha = alpha_digest
        .map(str::to_string)
        .unwrap_or_else(|| super::file_sha256(&alpha_archive).expect("digest"));
    let checker_sha = super::file_sha256(&checker_archive).expect("digest");

    fs::write(
        root.join("pave.lock"),
        format!(
            "version = 1\npackage = \"sample\"\n\n\
             [[dependency]]\nname = \"alpha\"\nversion = \"{alpha_pin}\"\nsha256 = \"{alpha_sha}\"\nfilename = \"alpha-1.4.0.tar.gz\"\n\n\
             [[dependency]]\nname = \"checker\"\nversion = \"2.0.1\"\nsha256 = \"{checker_sha}\"\nfilename = \"checker-2.0.1.tar.gz\"\ndev = true\n"
        ),
    )
    .expect("write lock");

    fs::create_dir_all(root.join("src")).expect("src dir");
    fs::write(root.join("src").join("app.txt"), "app v1").expect("write app");
    fs::create_dir_all(root.join("bin")).expect("bin dir");
    fs::write(root.join("bin").join("app"), "#!/bin/sh\nexit 0\n").expect("write entrypoint");

    let manifest = Manifest::load(root.join("pave.toml")).expect("load manifest");
    let lockfile = Lockfile::load(root.join("pave.lock")).expect("load lock");
    Fixture {
        _temp: temp,
        root,
        manifest,
        lockfile,
    }
}
