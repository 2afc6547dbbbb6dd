#![deny(clippy::all, warnings)]

mod lockfile;
mod manifest;

pub use lockfile::{
    verify_against_manifest, LockMismatchDetail, LockedDependency, Lockfile, MismatchKind,
    LOCK_VERSION,
};
pub use manifest::{Manifest, Requirement, LOCK_FILE_NAME, MANIFEST_FILE_NAME};
