mod io;
mod types;
mod verify;

pub use types::{LockedDependency, Lockfile, LOCK_VERSION};
pub use verify::{verify_against_manifest, LockMismatchDetail, MismatchKind};
