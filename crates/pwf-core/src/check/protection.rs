use crate::archive::ArchivePath;
use crate::error::{Error, Result};
use crate::permissions::{filemode, is_writable};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// `dir` and every entry beneath it that still carries a write bit.
/// Symlinks are skipped.
pub(super) fn unprotected(dir: &Path, archive: &ArchivePath) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if entry.path_is_symlink() {
            continue;
        }
        let metadata = entry.metadata()?;
        if is_writable(&metadata) {
            info!(
                "Not protected: {} {}",
                filemode(&metadata),
                archive.display(entry.path())
            );
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

pub(super) fn check(dir: &Path, archive: &ArchivePath) -> Result<()> {
    info!("check protection...");
    let paths = unprotected(dir, archive)?;
    if paths.is_empty() {
        Ok(())
    } else {
        Err(Error::ProtectionViolation { paths })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ArchiveConfig;
    use crate::permissions::{lock, unlock};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reports_every_writable_entry() {
        let dir = tempdir().unwrap();
        let year = dir.path().join("1_original/2024");
        fs::create_dir_all(year.join("jpg")).unwrap();
        fs::write(year.join("jpg/a.jpg"), b"a").unwrap();
        fs::write(year.join("jpg/b.jpg"), b"b").unwrap();
        std::os::unix::fs::symlink(year.join("jpg/a.jpg"), year.join("link.jpg")).unwrap();
        let archive = ArchivePath::parse(&year, &ArchiveConfig::default()).unwrap();

        lock(&year.join("jpg/a.jpg")).unwrap();
        let found = unprotected(&archive.path, &archive).unwrap();
        assert_eq!(found.len(), 3);
        assert!(!found.iter().any(|p| p.ends_with("link.jpg")));

        for path in [year.join("jpg/b.jpg"), year.join("jpg"), year.clone()] {
            lock(&path).unwrap();
        }
        check(&archive.path, &archive).unwrap();

        unlock(&year).unwrap();
        unlock(&year.join("jpg")).unwrap();
    }
}
