use crate::archive::ArchivePath;
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Camera-assigned part of a raw file's stem, e.g. `DSC_1234` of
/// `2024-10-30_DSC_1234`.
const KEY_CHARS: usize = 8;

fn raw_key(path: &Path) -> Option<String> {
    let stem: Vec<char> = path.file_stem()?.to_string_lossy().chars().collect();
    let start = stem.len().saturating_sub(KEY_CHARS);
    Some(stem[start..].iter().collect())
}

/// Groups of entries sharing the name key of a raw file, raw included.
pub(super) fn find(dir: &Path, config: &ArchiveConfig) -> Result<Vec<Vec<PathBuf>>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        entries.push(entry?.into_path());
    }

    let mut groups = BTreeSet::new();
    for raw in entries.iter().filter(|path| {
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| config.is_raw(ext))
    }) {
        let Some(key) = raw_key(raw) else { continue };
        let members: BTreeSet<PathBuf> = entries
            .iter()
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().contains(key.as_str()))
            })
            .cloned()
            .collect();
        if members.len() > 1 {
            groups.insert(members.into_iter().collect::<Vec<_>>());
        }
    }
    Ok(groups.into_iter().collect())
}

pub(super) fn check(dir: &Path, config: &ArchiveConfig, archive: &ArchivePath) -> Result<()> {
    info!("check raw derivatives...");
    let groups = find(dir, config)?;
    for group in &groups {
        info!("Files with same name:");
        for path in group {
            info!("    {}", archive.display(path));
        }
    }
    if groups.is_empty() {
        Ok(())
    } else {
        Err(Error::RawDerivativeSuspected { groups })
    }
}
