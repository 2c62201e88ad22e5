use crate::archive::ArchivePath;
use crate::config::DuplicateSettings;
use crate::error::{Error, Result};
use crate::hashing::fingerprint_file;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Groups of files with identical size and fingerprint.
pub(super) fn find(dir: &Path, settings: &DuplicateSettings) -> Result<Vec<Vec<PathBuf>>> {
    let mut by_size: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            let size = entry.metadata()?.len();
            by_size.entry(size).or_default().push(entry.into_path());
        }
    }

    let mut by_fingerprint: BTreeMap<(u64, String), Vec<PathBuf>> = BTreeMap::new();
    for (size, paths) in by_size {
        if paths.len() < 2 {
            continue;
        }
        for path in paths {
            let fingerprint = fingerprint_file(&path, settings)?;
            debug!(size, %fingerprint, path = %path.display(), "candidate");
            by_fingerprint
                .entry((size, fingerprint))
                .or_default()
                .push(path);
        }
    }

    Ok(by_fingerprint
        .into_values()
        .filter(|paths| paths.len() > 1)
        .collect())
}

pub(super) fn check(
    dir: &Path,
    settings: &DuplicateSettings,
    archive: &ArchivePath,
) -> Result<()> {
    info!("check duplicates...");
    let groups = find(dir, settings)?;
    for group in &groups {
        info!("Found identical files:");
        for path in group {
            info!("    {}", archive.display(path));
        }
    }
    if groups.is_empty() {
        Ok(())
    } else {
        Err(Error::DuplicateFound { groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fingerprint;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn groups_identical_files_only() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/one.jpg"), b"same").unwrap();
        fs::write(dir.path().join("two.jpg"), b"same").unwrap();
        fs::write(dir.path().join("other.jpg"), b"diff").unwrap();
        fs::write(dir.path().join("longer.jpg"), b"same-but-longer").unwrap();

        let groups = find(dir.path(), &DuplicateSettings::default()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].contains(&dir.path().join("a/one.jpg")));
        assert!(groups[0].contains(&dir.path().join("two.jpg")));
    }

    #[test]
    fn prefix_collision_counts_as_duplicate() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"headerAAAA").unwrap();
        fs::write(dir.path().join("b.jpg"), b"headerBBBB").unwrap();

        let prefix = DuplicateSettings {
            fingerprint: Fingerprint::Crc32,
            prefix_bytes: Some(6),
        };
        assert_eq!(find(dir.path(), &prefix).unwrap().len(), 1);

        let whole = DuplicateSettings {
            fingerprint: Fingerprint::Blake3,
            prefix_bytes: None,
        };
        assert!(find(dir.path(), &whole).unwrap().is_empty());
    }
}
