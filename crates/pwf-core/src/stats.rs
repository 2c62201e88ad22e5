//! File counts and sizes per media kind.

use crate::config::{ArchiveConfig, MediaKind};
use crate::error::Result;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub kind: MediaKind,
    pub count: u64,
    pub bytes: u64,
}

impl CategoryStats {
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// Counts regular files beneath `dir` by extension, wherever they live.
pub fn statistics(dir: &Path, config: &ArchiveConfig) -> Result<Vec<CategoryStats>> {
    let mut stats: Vec<CategoryStats> = MediaKind::ALL
        .into_iter()
        .map(|kind| CategoryStats {
            kind,
            count: 0,
            bytes: 0,
        })
        .collect();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| config.media_kind(ext))
        else {
            continue;
        };
        let size = entry.metadata()?.len();
        if let Some(slot) = stats.iter_mut().find(|s| s.kind == kind) {
            slot.count += 1;
            slot.bytes += size;
        }
    }
    Ok(stats)
}

/// Binary-unit size, e.g. `512 B`, `1.5 KiB`, `20.0 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64;
    let mut unit = UNITS[0];
    for candidate in UNITS {
        size /= 1024.0;
        unit = candidate;
        if size < 1024.0 {
            break;
        }
    }
    format!("{size:.1} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(20 * 1024 * 1024), "20.0 MiB");
        assert_eq!(format_size(3 * 1024u64.pow(4)), "3.0 TiB");
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.0 TiB");
    }

    #[test]
    fn counts_by_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/raw")).unwrap();
        fs::write(dir.path().join("a/raw/x.NEF"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("a/raw/y.CR2"), vec![0u8; 50]).unwrap();
        fs::write(dir.path().join("b.jpg"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let stats = statistics(dir.path(), &ArchiveConfig::default()).unwrap();
        assert_eq!(stats.len(), 4);
        assert_eq!((stats[0].label(), stats[0].count, stats[0].bytes), ("RAW images", 2, 150));
        assert_eq!((stats[1].count, stats[1].bytes), (1, 10));
        assert_eq!(stats[2].count + stats[3].count, 0);
    }
}
