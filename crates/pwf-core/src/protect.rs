//! Protection controller: extends the manifest and locks a directory tree,
//! or unlocks it again for additive changes.

use crate::archive::ArchivePath;
use crate::check::{has_covering_manifest, CheckKind, CheckOptions, Checker};
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::manifest::{ManifestEntry, ManifestStore};
use crate::permissions::{lock, unlock};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectReport {
    pub manifest: PathBuf,
    /// Entries appended to the manifest by this run.
    pub added: Vec<ManifestEntry>,
    pub locked: usize,
}

pub struct ProtectionController<'a> {
    config: &'a ArchiveConfig,
    store: ManifestStore,
}

impl<'a> ProtectionController<'a> {
    pub fn new(config: &'a ArchiveConfig) -> Self {
        Self {
            config,
            store: ManifestStore::new(config.checksum),
        }
    }

    fn existing(dir: &Path) -> Result<PathBuf> {
        dir.canonicalize()
            .map_err(|_| Error::precondition(format!("Path does not exist: {}", dir.display())))
    }

    /// Checks `dir` (unless `forced`), extends its manifest and removes every
    /// write permission from the tree, `dir` included.
    pub fn protect(&self, dir: &Path, forced: bool) -> Result<ProtectReport> {
        let mut dir = Self::existing(dir)?;
        if !forced {
            let archive = ArchivePath::parse(&dir, self.config)?;
            let mut ignored = vec![CheckKind::Protection];
            if !has_covering_manifest(&dir, self.config, &archive) {
                ignored.extend([CheckKind::Checksum, CheckKind::Missing]);
            }
            dir = Checker::new(self.config)
                .run(&dir, &CheckOptions::ignoring(ignored))?
                .path;
        }

        let manifest = self.store.manifest_path(&dir)?;
        let existed = manifest.exists();
        if existed {
            unlock(&manifest)?;
        }
        let added = match self.store.compute(&dir) {
            Ok(added) => added,
            Err(err) => {
                if existed {
                    lock(&manifest)?;
                }
                return Err(err);
            }
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false).contents_first(true) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            } else if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        for path in files.iter().chain(dirs.iter()) {
            debug!(path = %path.display(), "lock");
            lock(path)?;
        }
        lock(&manifest)?;

        info!(
            dir = %dir.display(),
            manifest = %manifest.display(),
            added = added.len(),
            "protected"
        );
        Ok(ProtectReport {
            manifest,
            added,
            locked: files.len() + dirs.len(),
        })
    }

    /// Grants write access to `dir` and every folder beneath it so files can
    /// be added; existing files stay locked unless `unlock_files` is set.
    pub fn unprotect(&self, dir: &Path, unlock_files: bool) -> Result<usize> {
        let dir = Self::existing(dir)?;
        let mut unlocked = 0;
        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() || (unlock_files && file_type.is_file()) {
                unlock(entry.path())?;
                unlocked += 1;
            }
        }
        let manifest = self.store.manifest_path(&dir)?;
        if manifest.exists() {
            unlock(&manifest)?;
        }
        info!(
            dir = %dir.display(),
            unlocked,
            files = unlock_files,
            "unprotected"
        );
        Ok(unlocked)
    }
}
