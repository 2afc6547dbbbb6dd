#![allow(dead_code)]

use std::{
    fs,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use assert_cmd::assert::Assert;
use flate2::{write::GzEncoder, Compression};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

pub struct ProjectFixture {
    pub temp: TempDir,
    pub root: PathBuf,
    pub cache: PathBuf,
}

/// A complete runnable project: manifest, artifact archives, a consistent
/// lockfile, sources, and a `bin/app` entrypoint.
pub fn prepare_project(prefix: &str) -> ProjectFixture {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let root = temp.path().join("sample_app");
    let cache = temp.path().join("cache");
    let artifacts = root.join("artifacts");
    fs::create_dir_all(&artifacts).expect("artifacts dir");

    fs::write(
        root.join("pave.toml"),
        "[package]\nname = \"sample\"\nversion = \"0.1.0\"\n\n[dependencies]\nalpha = \"^1.2\"\n\n[dev-dependencies]\nchecker = \"^2\"\n",
    )
    .expect("write manifest");

    build_archive(
        &artifacts.join("alpha-1.4.0.tar.gz"),
        &[
            ("lib/alpha.txt", "alpha payload", 0o644),
            ("bin/greet", "#!/bin/sh\necho env-greeting\n", 0o755),
        ],
    );
    build_archive(
        &artifacts.join("checker-2.0.1.tar.gz"),
        &[("lib/checker.txt", "checker payload", 0o644)],
    );
    write_lock(&root, "1.4.0", None);

    fs::create_dir_all(root.join("src")).expect("src dir");
    fs::write(root.join("src").join("app.txt"), "app v1").expect("write source");
    write_entrypoint(&root, "app", "#!/bin/sh\nexit 0\n");

    ProjectFixture { temp, root, cache }
}

/// Rewrite the lockfile, pinning alpha at `alpha_version`. The recorded
/// digests are real unless `alpha_sha_override` forces a bad one.
pub fn write_lock(root: &Path, alpha_version: &str, alpha_sha_override: Option<&str>) {
    let artifacts = root.join("artifacts");
    let alpha_sha = alpha_sha_override
        .map(str::to_string)
        .unwrap_or_else(|| file_sha256(&artifacts.join("alpha-1.4.0.tar.gz")));
    let checker_sha = file_sha256(&artifacts.join("checker-2.0.1.tar.gz"));
    fs::write(
        root.join("pave.lock"),
        format!(
            "version = 1\npackage = \"sample\"\n\n\
             [[dependency]]\nname = \"alpha\"\nversion = \"{alpha_version}\"\nsha256 = \"{alpha_sha}\"\nfilename = \"alpha-1.4.0.tar.gz\"\n\n\
             [[dependency]]\nname = \"checker\"\nversion = \"2.0.1\"\nsha256 = \"{checker_sha}\"\nfilename = \"checker-2.0.1.tar.gz\"\ndev = true\n"
        ),
    )
    .expect("write lock");
}

pub fn write_entrypoint(root: &Path, name: &str, body: &str) {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).expect("bin dir");
    let path = bin.join(name);
    fs::write(&path, body).expect("write entrypoint");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod entrypoint");
    }
}

pub fn build_archive(path: &Path, files: &[(&str, &str, u32)]) {
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

pub fn file_sha256(path: &Path) -> String {
    let file = File::open(path).expect("open file");
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf).expect("read file");
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    hex::encode(hasher.finalize())
}

/// Published dependency cache entries, sorted.
pub fn cache_entries(cache: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(cache.join("packages")) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
