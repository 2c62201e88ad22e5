use crate::archive::ArchivePath;
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct Placement {
    pub misplaced: Vec<PathBuf>,
    /// Extensions with no known folder; `""` for files without one.
    pub ignored: BTreeSet<String>,
}

/// Every file with a known extension must sit directly in its media folder.
pub(super) fn inspect(dir: &Path, config: &ArchiveConfig) -> Result<Placement> {
    let mut placement = Placement::default();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        match config.media_kind(&extension) {
            Some(kind) => {
                let parent = path.parent().and_then(Path::file_name);
                if parent.and_then(|name| name.to_str()) != Some(kind.folder()) {
                    placement.misplaced.push(entry.into_path());
                }
            }
            None => {
                placement.ignored.insert(extension);
            }
        }
    }
    Ok(placement)
}

pub(super) fn check(dir: &Path, config: &ArchiveConfig, archive: &ArchivePath) -> Result<()> {
    info!("check paths...");
    let placement = inspect(dir, config)?;
    for path in &placement.misplaced {
        info!("File in wrong location: {}", archive.display(path));
    }
    if !placement.ignored.is_empty() {
        let suffixes: Vec<&str> = placement
            .ignored
            .iter()
            .map(|ext| if ext.is_empty() { "(none)" } else { ext.as_str() })
            .collect();
        warn!("Ignored suffixes: {}", suffixes.join(", "));
    }
    if placement.misplaced.is_empty() {
        Ok(())
    } else {
        Err(Error::PathStructureViolation {
            paths: placement.misplaced,
        })
    }
}
