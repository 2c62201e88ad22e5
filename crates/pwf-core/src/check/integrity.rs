use crate::archive::ArchivePath;
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::manifest::{ManifestLocation, ManifestStore};
use std::path::Path;
use tracing::info;

/// Manifest covering `dir`, searched up to and including the role folder.
pub fn covering_manifest(
    dir: &Path,
    config: &ArchiveConfig,
    archive: &ArchivePath,
) -> Option<ManifestLocation> {
    ManifestStore::new(config.checksum).locate(dir, &archive.root)
}

pub fn has_covering_manifest(dir: &Path, config: &ArchiveConfig, archive: &ArchivePath) -> bool {
    covering_manifest(dir, config, archive).is_some()
}

fn require_manifest(
    dir: &Path,
    config: &ArchiveConfig,
    archive: &ArchivePath,
) -> Result<ManifestLocation> {
    covering_manifest(dir, config, archive).ok_or_else(|| {
        Error::precondition(format!(
            "No {} manifest found for {}",
            config.checksum.manifest_extension(),
            archive.display(dir)
        ))
    })
}

pub(super) fn check_checksums(
    dir: &Path,
    config: &ArchiveConfig,
    archive: &ArchivePath,
) -> Result<()> {
    info!("check checksums...");
    let location = require_manifest(dir, config, archive)?;
    let report = ManifestStore::new(config.checksum).verify(dir, &location)?;
    if !report.mismatched.is_empty() {
        return Err(Error::ChecksumMismatch {
            mismatched: report.mismatched,
            missing: report.missing,
        });
    }
    if !report.missing.is_empty() {
        return Err(Error::MissingFile {
            paths: report.missing,
        });
    }
    Ok(())
}

pub(super) fn check_missing(
    dir: &Path,
    config: &ArchiveConfig,
    archive: &ArchivePath,
) -> Result<()> {
    info!("check missing files...");
    let location = require_manifest(dir, config, archive)?;
    let paths = ManifestStore::new(config.checksum).missing(dir, &location)?;
    if paths.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingFile { paths })
    }
}
