//! Integrity checker.
//!
//! Runs the selected categories in a fixed order (names, duplicates,
//! protection, raw derivatives, locations, checksums or missing files) and
//! stops at the first failing category. Each category logs every violation
//! it finds before returning.

mod duplicates;
mod integrity;
mod protection;
mod raw;
mod selection;
mod structure;

pub use integrity::{covering_manifest, has_covering_manifest};
pub use selection::{checklist, parse_check_list, CheckKind, Selection};

use crate::archive::ArchivePath;
use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::names::NameValidator;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub selection: Selection,
    /// Rename illegal names before validating them.
    pub fix_names: bool,
    /// With `fix_names`, only log the renames and stop.
    pub dry_run: bool,
}

impl CheckOptions {
    pub fn ignoring(kinds: impl IntoIterator<Item = CheckKind>) -> Self {
        Self {
            selection: Selection::Ignore(kinds.into_iter().collect()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// The checked directory, after any name fixes.
    pub path: PathBuf,
    pub checks: BTreeSet<CheckKind>,
    /// False when a dry-run fix stopped before validation.
    pub completed: bool,
}

pub struct Checker<'a> {
    config: &'a ArchiveConfig,
}

impl<'a> Checker<'a> {
    pub fn new(config: &'a ArchiveConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, path: &Path, options: &CheckOptions) -> Result<CheckOutcome> {
        let archive = ArchivePath::parse(path, self.config)?;
        let checks = checklist(archive.role, &options.selection)?;
        info!(
            "Things to check: {}",
            checks
                .iter()
                .map(|kind| kind.token())
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!(?options, "check");

        let mut dir = archive.path.clone();
        if checks.contains(&CheckKind::Name) {
            let names = NameValidator::new(self.config);
            if options.fix_names {
                dir = names.fix(&dir, options.dry_run, &archive)?;
                if options.dry_run {
                    return Ok(CheckOutcome {
                        path: dir,
                        checks,
                        completed: false,
                    });
                }
            } else {
                names.check(&dir, &archive)?;
            }
        }

        if checks.contains(&CheckKind::Duplicate) {
            duplicates::check(&dir, &self.config.duplicates, &archive)?;
        }
        if checks.contains(&CheckKind::Protection) {
            protection::check(&dir, &archive)?;
        }
        if checks.contains(&CheckKind::RawDerivative) {
            raw::check(&dir, self.config, &archive)?;
        }
        if checks.contains(&CheckKind::Path) {
            structure::check(&dir, self.config, &archive)?;
        }
        if checks.contains(&CheckKind::Checksum) {
            integrity::check_checksums(&dir, self.config, &archive)?;
        } else if checks.contains(&CheckKind::Missing) {
            integrity::check_missing(&dir, self.config, &archive)?;
        }

        info!("check: OK");
        Ok(CheckOutcome {
            path: dir,
            checks,
            completed: true,
        })
    }
}
