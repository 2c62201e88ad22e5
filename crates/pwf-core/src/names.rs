//! Name validation and auto-fix for file and folder names.

use crate::archive::ArchivePath;
use crate::config::ArchiveConfig;
use crate::error::{Error, IoResultExt, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// A single planned rename. `from` is valid at the time the rename runs
/// because plans are applied deepest path first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl Rename {
    pub fn new_name(&self) -> String {
        self.to
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct NameValidator<'a> {
    config: &'a ArchiveConfig,
}

impl<'a> NameValidator<'a> {
    pub fn new(config: &'a ArchiveConfig) -> Self {
        Self { config }
    }

    pub fn is_legal(&self, name: &str) -> bool {
        self.config.is_legal_name(name)
    }

    fn entry_is_legal(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.is_legal(name),
            None => false,
        }
    }

    /// Applies the configured replacements in order.
    pub fn sanitize(&self, name: &str) -> String {
        self.config
            .name_replacements
            .iter()
            .fold(name.to_string(), |acc, (from, to)| acc.replace(from, to))
    }

    fn illegal_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut illegal = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if !self.entry_is_legal(entry.path()) {
                illegal.push(entry.into_path());
            }
        }
        Ok(illegal)
    }

    /// Checks `dir` and every entry beneath it, reporting all violations.
    pub fn check(&self, dir: &Path, archive: &ArchivePath) -> Result<()> {
        info!("check names...");
        let illegal = self.illegal_paths(dir)?;
        for path in &illegal {
            info!("Illegal: '{}'", archive.display(path));
        }
        if illegal.is_empty() {
            Ok(())
        } else {
            Err(Error::NameViolation { paths: illegal })
        }
    }

    /// Rename plan for every illegal name under (and including) `dir`,
    /// deepest paths first.
    pub fn plan(&self, dir: &Path) -> Result<Vec<Rename>> {
        let mut plan: Vec<Rename> = self
            .illegal_paths(dir)?
            .into_iter()
            .filter_map(|from| {
                let name = from.file_name()?.to_string_lossy().into_owned();
                let to = from.with_file_name(self.sanitize(&name));
                (to != from).then_some(Rename { from, to })
            })
            .collect();
        plan.sort_by(|a, b| {
            let depth = |p: &Path| p.components().count();
            depth(&b.from)
                .cmp(&depth(&a.from))
                .then_with(|| b.from.cmp(&a.from))
        });
        Ok(plan)
    }

    /// Every target must be free on disk and unique within the plan, checked
    /// before anything is renamed.
    fn refuse_collisions(&self, plan: &[Rename], archive: &ArchivePath) -> Result<()> {
        let mut targets = HashSet::new();
        for rename in plan {
            if fs::symlink_metadata(&rename.to).is_ok() || !targets.insert(&rename.to) {
                return Err(Error::precondition(format!(
                    "Cannot rename '{}': '{}' already exists",
                    archive.display(&rename.from),
                    archive.display(&rename.to)
                )));
            }
        }
        Ok(())
    }

    /// Executes (or, in dry-run, only logs) a plan. Returns where `dir`
    /// lives afterwards.
    pub fn apply(
        &self,
        dir: &Path,
        plan: &[Rename],
        dry_run: bool,
        archive: &ArchivePath,
    ) -> Result<PathBuf> {
        if dry_run {
            info!("Dry-run: would do the following:");
        } else {
            self.refuse_collisions(plan, archive)?;
        }
        let mut root = dir.to_path_buf();
        for rename in plan {
            info!(
                "rename: '{}' -> '{}'",
                archive.display(&rename.from),
                rename.new_name()
            );
            if !self.is_legal(&rename.new_name()) {
                warn!("'{}' is still not a legal name", rename.new_name());
            }
            if dry_run {
                continue;
            }
            fs::rename(&rename.from, &rename.to).at(&rename.from)?;
            if rename.from == root {
                root = rename.to.clone();
            }
        }
        Ok(root)
    }

    /// Plans, applies and re-validates. Anything still illegal afterwards
    /// fails with `NameViolation`.
    pub fn fix(&self, dir: &Path, dry_run: bool, archive: &ArchivePath) -> Result<PathBuf> {
        info!("fix names...");
        let plan = self.plan(dir)?;
        let root = self.apply(dir, &plan, dry_run, archive)?;
        if !dry_run {
            self.check(&root, archive)?;
        }
        Ok(root)
    }
}
