//! Manifest store: the append-only checksum ledger kept next to a protected
//! directory.
//!
//! A manifest for `<parent>/<dir>` lives at `<parent>/<dir>.<ext>` and holds
//! one `<checksum> *<path>` line per file, `<path>` relative to `<parent>`.
//! That is the `md5sum` binary-mode format, so `md5sum -c` can verify an MD5
//! manifest from `<parent>`.

use crate::config::ChecksumAlgorithm;
use crate::error::{Error, IoResultExt, Result};
use crate::hashing::checksum_file;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub checksum: String,
    /// Relative to the manifest's parent directory.
    pub path: PathBuf,
}

impl ManifestEntry {
    pub fn to_line(&self) -> String {
        format!("{} *{}\n", self.checksum, portable(&self.path))
    }
}

/// Joins components with `/` regardless of platform.
fn portable(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A manifest line must read back as the same path: UTF-8, one line.
fn is_listable(path: &Path) -> bool {
    path.to_str().is_some_and(|p| !p.contains(['\n', '\r']))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<PathBuf, String>,
}

impl Manifest {
    /// Parses manifest text, splitting each line on its first whitespace run.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r').trim_start();
            if line.trim().is_empty() {
                continue;
            }
            let (checksum, rest) = line
                .split_once(char::is_whitespace)
                .map(|(c, r)| (c, r.trim_start()))
                .unwrap_or((line, ""));
            let path = rest.strip_prefix('*').unwrap_or(rest);
            if path.is_empty() {
                return Err(Error::precondition(format!(
                    "Malformed manifest line {}: '{}'",
                    index + 1,
                    raw
                )));
            }
            if entries
                .insert(PathBuf::from(path), checksum.to_string())
                .is_some()
            {
                warn!("manifest lists '{path}' more than once, using the last entry");
            }
        }
        Ok(Self { entries })
    }

    pub fn load(file: &Path) -> Result<Self> {
        let text = fs::read_to_string(file).at(file)?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn checksum(&self, path: &Path) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Entries whose path lies under `prefix` (all entries for an empty
    /// prefix).
    pub fn entries_under<'a>(
        &'a self,
        prefix: &'a Path,
    ) -> impl Iterator<Item = (&'a PathBuf, &'a String)> + 'a {
        self.entries
            .iter()
            .filter(move |(path, _)| path.starts_with(prefix))
    }
}

/// Where the manifest covering a directory was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    pub file: PathBuf,
    /// Directory the manifest's paths are relative to.
    pub base: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub mismatched: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    /// Present on disk but not listed; informational only.
    pub untracked: Vec<PathBuf>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ManifestStore {
    algorithm: ChecksumAlgorithm,
}

impl ManifestStore {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// `<parent>/<dir>.<ext>` for `dir`.
    pub fn manifest_path(&self, dir: &Path) -> Result<PathBuf> {
        let name = dir.file_name().ok_or_else(|| {
            Error::precondition(format!("No manifest possible for {}", dir.display()))
        })?;
        let parent = dir.parent().unwrap_or(Path::new(""));
        Ok(parent.join(format!(
            "{}.{}",
            name.to_string_lossy(),
            self.algorithm.manifest_extension()
        )))
    }

    /// First manifest found for `dir` or one of its ancestors, stopping
    /// before `stop`.
    pub fn locate(&self, dir: &Path, stop: &Path) -> Option<ManifestLocation> {
        for ancestor in dir.ancestors() {
            if ancestor == stop || !ancestor.starts_with(stop) {
                break;
            }
            let Ok(file) = self.manifest_path(ancestor) else {
                break;
            };
            if file.is_file() {
                let base = ancestor.parent()?.to_path_buf();
                debug!("manifest for {} is {}", dir.display(), file.display());
                return Some(ManifestLocation { file, base });
            }
        }
        None
    }

    /// Extends `dir`'s own manifest with every regular file not yet listed.
    /// Existing entries are never recomputed or rewritten. The manifest is
    /// created (possibly empty) if absent.
    pub fn compute(&self, dir: &Path) -> Result<Vec<ManifestEntry>> {
        let file = self.manifest_path(dir)?;
        let base = dir.parent().unwrap_or(Path::new("")).to_path_buf();
        let existing_text = if file.exists() {
            fs::read_to_string(&file).at(&file)?
        } else {
            String::new()
        };
        let existing = Manifest::parse(&existing_text)?;

        let mut pending = Vec::new();
        let mut unlisted = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&base)
                .unwrap_or(entry.path())
                .to_path_buf();
            if existing.contains(&relative) {
                continue;
            }
            if !is_listable(&relative) {
                error!("Cannot list in manifest: {}", relative.display());
                unlisted.push(relative);
                continue;
            }
            pending.push(relative);
        }
        if !unlisted.is_empty() {
            return Err(Error::precondition(format!(
                "{} file name(s) cannot be written to {}, fix the names first",
                unlisted.len(),
                file.display()
            )));
        }

        let mut added = Vec::with_capacity(pending.len());
        for relative in pending {
            let full = base.join(&relative);
            let checksum = checksum_file(&full, self.algorithm)?;
            debug!("checksum {} {}", checksum, relative.display());
            added.push(ManifestEntry {
                checksum,
                path: relative,
            });
        }

        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
            .at(&file)?;
        if !added.is_empty() {
            if !existing_text.is_empty() && !existing_text.ends_with('\n') {
                out.write_all(b"\n").at(&file)?;
            }
            for entry in &added {
                out.write_all(entry.to_line().as_bytes()).at(&file)?;
            }
            out.flush().at(&file)?;
        }
        info!(
            "manifest {}: {} existing, {} added",
            file.display(),
            existing.len(),
            added.len()
        );
        Ok(added)
    }

    fn current_files(&self, dir: &Path, base: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut files = BTreeSet::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() {
                if let Ok(relative) = entry.path().strip_prefix(base) {
                    files.insert(relative.to_path_buf());
                }
            }
        }
        Ok(files)
    }

    /// Recomputes every entry under `dir` and compares against the manifest.
    pub fn verify(&self, dir: &Path, location: &ManifestLocation) -> Result<VerifyReport> {
        let manifest = Manifest::load(&location.file)?;
        let prefix = dir.strip_prefix(&location.base).unwrap_or(Path::new(""));
        let mut report = VerifyReport::default();

        for (path, expected) in manifest.entries_under(prefix) {
            let full = location.base.join(path);
            if fs::symlink_metadata(&full).is_err() {
                error!("File missing: {}", path.display());
                report.missing.push(full);
                continue;
            }
            let actual = checksum_file(&full, self.algorithm)?;
            if &actual != expected {
                error!("Checksum error: {} {}", expected, path.display());
                report.mismatched.push(full);
            }
        }

        for relative in self.current_files(dir, &location.base)? {
            if !manifest.contains(&relative) {
                warn!("Not in manifest: {}", relative.display());
                report.untracked.push(location.base.join(relative));
            }
        }
        Ok(report)
    }

    /// Manifest entries under `dir` whose file no longer exists. Does not
    /// read file contents.
    pub fn missing(&self, dir: &Path, location: &ManifestLocation) -> Result<Vec<PathBuf>> {
        let manifest = Manifest::load(&location.file)?;
        let prefix = dir.strip_prefix(&location.base).unwrap_or(Path::new(""));
        let mut missing = Vec::new();
        for (path, _) in manifest.entries_under(prefix) {
            let full = location.base.join(path);
            if fs::symlink_metadata(&full).is_err() {
                error!("File missing: {}", path.display());
                missing.push(full);
            }
        }
        Ok(missing)
    }
}
