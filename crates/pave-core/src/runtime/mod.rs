pub mod launch;
pub mod paths;
