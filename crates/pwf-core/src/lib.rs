//! Photo workflow archive tooling: name rules, checksum manifests, write
//! protection and the integrity checks that guard the archive stages.

pub mod archive;
pub mod check;
pub mod config;
pub mod error;
pub mod hashing;
pub mod manifest;
pub mod names;
pub mod paths;
pub mod permissions;
pub mod protect;
pub mod stats;
pub mod workflow;

pub use config::ArchiveConfig;
pub use error::{Error, Result};
