//! Workflow orchestrator: staging, import into the protected archive and lab
//! linking. Every step checks before it mutates and protects afterwards.

use crate::archive::{ArchivePath, Role};
use crate::check::{CheckKind, CheckOptions, Checker, Selection};
use crate::config::{ArchiveConfig, MediaKind};
use crate::error::{Error, IoResultExt, Result};
use crate::protect::{ProtectReport, ProtectionController};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;
pub const PREVIEW_FOLDER: &str = "1_preview";
pub const LAB_SOURCE_PREFIX: &str = "2_original_";
pub const TEMPLATE_EVENT: &str = "template";

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Used when the event name carries no date.
    pub year: Option<i32>,
    /// Checks to skip; only `raw` may be skipped.
    pub ignore: BTreeSet<CheckKind>,
    pub keep_unprotected: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub destination: PathBuf,
    pub protected: Option<ProtectReport>,
}

#[derive(Debug, Clone, Default)]
pub struct LabOptions {
    /// Link every image, previewed or not.
    pub all: bool,
    /// Checks to skip; only `raw` may be skipped, as on import.
    pub ignore: BTreeSet<CheckKind>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabReport {
    pub lab_event: PathBuf,
    pub linked: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Regular files found among the links; never deleted.
    pub kept: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Also create a small example event in `0_new`.
    pub example: bool,
}

fn link_folder(kind: MediaKind) -> String {
    format!("{LAB_SOURCE_PREFIX}{}", kind.folder())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Moves a directory, copying when a rename is not possible (e.g. across
/// filesystems).
fn move_dir(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            warn!(error = %rename_err, "rename failed, trying copy");
            let parent = to.parent().unwrap_or(Path::new("."));
            let options = fs_extra::dir::CopyOptions::new();
            fs_extra::dir::move_dir(from, parent, &options)
                .map_err(|e| Error::io(from, io::Error::other(e.to_string())))?;
            Ok(())
        }
    }
}

/// Selection for an archived event. Camera RAW+JPG pairs are the one
/// finding that may be waived.
fn archive_selection(ignore: &BTreeSet<CheckKind>) -> Result<Selection> {
    if ignore.is_empty() {
        return Ok(Selection::All);
    }
    if ignore.iter().any(|kind| *kind != CheckKind::RawDerivative) {
        return Err(Error::Config("Only allowed ignore item is 'raw'!".into()));
    }
    warn!("Ignoring checks on archived events is dangerous and strongly discouraged!");
    Ok(Selection::Ignore(ignore.clone()))
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        if entry.file_type().at(dir)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

pub struct Workflow<'a> {
    config: &'a ArchiveConfig,
}

impl<'a> Workflow<'a> {
    pub fn new(config: &'a ArchiveConfig) -> Self {
        Self { config }
    }

    fn checker(&self) -> Checker<'a> {
        Checker::new(self.config)
    }

    /// Creates (or completes) an event folder directly below `0_new` with
    /// the typed media subfolders, then checks it.
    pub fn stage_new_archive(&self, path: &Path) -> Result<PathBuf> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::precondition("Event folder name missing"))?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = ArchivePath::parse(parent, self.config)?;
        if staging.role != Role::New || !staging.within_role().as_os_str().is_empty() {
            return Err(Error::precondition(format!(
                "New events must be created directly in {}!",
                Role::New
            )));
        }
        if !self.config.is_legal_name(&name) {
            info!("Illegal: '{name}'");
            return Err(Error::NameViolation {
                paths: vec![staging.path.join(&name)],
            });
        }

        let event = staging.path.join(&name);
        for kind in MediaKind::ALL {
            let folder = event.join(kind.folder());
            fs::create_dir_all(&folder).at(&folder)?;
        }
        info!("staged {}", staging.display(&event));
        self.checker().run(&event, &CheckOptions::default())?;
        Ok(event)
    }

    /// Moves a checked event from `0_new` to `1_original/<year>/` and
    /// protects the year folder.
    pub fn import_to_original(&self, path: &Path, options: &ImportOptions) -> Result<ImportReport> {
        let source = ArchivePath::parse(path, self.config)?;
        if source.role != Role::New || !source.is_event_dir {
            return Err(Error::precondition(
                "Invalid path! Can only run against event dirs in 0_new!",
            ));
        }
        let event = source
            .event
            .clone()
            .ok_or_else(|| Error::precondition("Invalid path! No event folder found"))?;

        let year = match (source.year, options.year) {
            (Some(parsed), Some(given)) if parsed != given => {
                warn!("Ignoring year {given}, event is dated {parsed}");
                parsed
            }
            (Some(parsed), _) => parsed,
            (None, Some(given)) if YEAR_RANGE.contains(&given) => given,
            (None, Some(given)) => {
                return Err(Error::precondition(format!(
                    "Invalid year {given}! Must be between {} and {}",
                    YEAR_RANGE.start(),
                    YEAR_RANGE.end()
                )))
            }
            (None, None) => {
                return Err(Error::precondition(
                    "Cannot auto-detect year and no year was provided!",
                ))
            }
        };

        let selection = archive_selection(&options.ignore)?;

        let year_dir = source
            .role_dir(Role::Original)
            .join(year.to_string());
        let destination = year_dir.join(&event);
        if fs::symlink_metadata(&destination).is_ok() {
            return Err(Error::precondition(format!(
                "Destination already exists: {}",
                source.display(&destination)
            )));
        }

        self.checker().run(
            &source.path,
            &CheckOptions {
                selection,
                ..CheckOptions::default()
            },
        )?;

        info!(
            "Move: {} -> {}",
            source.display(&source.path),
            source.display(&destination)
        );
        if options.dry_run {
            info!("Dry-run, doing nothing...");
            return Ok(ImportReport {
                destination,
                protected: None,
            });
        }

        let controller = ProtectionController::new(self.config);
        if year_dir.exists() {
            controller.unprotect(&year_dir, false)?;
        } else {
            fs::create_dir_all(&year_dir).at(&year_dir)?;
        }
        move_dir(&source.path, &destination)?;

        let protected = if options.keep_unprotected {
            warn!(
                "{} left unprotected, protect it when done",
                source.display(&year_dir)
            );
            None
        } else {
            Some(controller.protect(&year_dir, true)?)
        };
        Ok(ImportReport {
            destination,
            protected,
        })
    }

    /// Links the files of an archived event into its lab folder. Images are
    /// only linked when a preview with the same stem exists, unless
    /// `options.all` is set.
    pub fn prepare_lab(&self, path: &Path, options: LabOptions) -> Result<LabReport> {
        let source = ArchivePath::parse(path, self.config)?;
        if source.role != Role::Original || !source.is_event_dir {
            return Err(Error::precondition(
                "Invalid path! Can only run against event dirs in 1_original!",
            ));
        }
        let selection = archive_selection(&options.ignore)?;
        self.checker().run(
            &source.path,
            &CheckOptions {
                selection,
                ..CheckOptions::default()
            },
        )?;

        let lab_event = source.role_dir(Role::Lab).join(source.within_role());
        let previews: BTreeSet<String> = {
            let dir = lab_event.join(PREVIEW_FOLDER);
            if dir.is_dir() {
                sorted_files(&dir)?.iter().filter_map(|p| stem(p)).collect()
            } else {
                BTreeSet::new()
            }
        };
        debug!(count = previews.len(), "previews");

        if options.dry_run {
            info!("Dry-run: would do the following:");
        }
        let mut report = LabReport {
            lab_event: lab_event.clone(),
            ..LabReport::default()
        };
        for kind in MediaKind::ALL {
            let from = source.path.join(kind.folder());
            if !from.is_dir() {
                continue;
            }
            let to = lab_event.join(link_folder(kind));
            for file in sorted_files(&from)? {
                let previewed = stem(&file).is_some_and(|s| previews.contains(&s));
                if matches!(kind, MediaKind::Raw | MediaKind::Jpg) && !options.all && !previewed {
                    debug!("no preview for {}", source.display(&file));
                    report.skipped.push(file);
                    continue;
                }
                let Some(name) = file.file_name() else { continue };
                let link = to.join(name);
                if let Ok(existing) = fs::read_link(&link) {
                    if existing == file {
                        report.linked.push(link);
                        continue;
                    }
                }
                if fs::symlink_metadata(&link).is_ok() {
                    return Err(Error::precondition(format!(
                        "Cannot link '{}': destination exists",
                        source.display(&link)
                    )));
                }
                info!(
                    "link: '{}' -> '{}'",
                    source.display(&link),
                    source.display(&file)
                );
                if !options.dry_run {
                    fs::create_dir_all(&to).at(&to)?;
                    symlink(&file, &link).at(&link)?;
                }
                report.linked.push(link);
            }
        }
        info!(
            linked = report.linked.len(),
            skipped = report.skipped.len(),
            "lab prepared"
        );
        Ok(report)
    }

    /// Removes the links created by `prepare_lab` and their folders once
    /// empty. Regular files are left alone.
    pub fn cleanup_lab(&self, path: &Path, dry_run: bool) -> Result<CleanupReport> {
        let lab = ArchivePath::parse(path, self.config)?;
        if lab.role != Role::Lab || !lab.is_event_dir {
            return Err(Error::precondition(
                "Invalid path! Can only run against event dirs in 2_lab!",
            ));
        }
        self.checker().run(&lab.path, &CheckOptions::default())?;

        if dry_run {
            info!("Dry-run: would do the following:");
        }
        let mut report = CleanupReport::default();
        for kind in MediaKind::ALL {
            let folder = lab.path.join(link_folder(kind));
            if !folder.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&folder).at(&folder)? {
                let entry = entry.at(&folder)?;
                let path = entry.path();
                if entry.file_type().at(&path)?.is_symlink() {
                    info!("remove link: '{}'", lab.display(&path));
                    if !dry_run {
                        fs::remove_file(&path).at(&path)?;
                    }
                    report.removed.push(path);
                } else {
                    warn!("Not a link, keeping: '{}'", lab.display(&path));
                    report.kept.push(path);
                }
            }
            let empty = fs::read_dir(&folder).at(&folder)?.next().is_none();
            if !dry_run && empty {
                info!("remove folder: '{}'", lab.display(&folder));
                fs::remove_dir(&folder).at(&folder)?;
            }
        }
        report.removed.sort();
        report.kept.sort();
        Ok(report)
    }

    /// Creates the archive skeleton. `root` must not exist yet.
    pub fn init(&self, root: &Path, options: InitOptions) -> Result<()> {
        if fs::symlink_metadata(root).is_ok() {
            return Err(Error::precondition(format!(
                "Archive root already exists: {}",
                root.display()
            )));
        }
        fs::create_dir_all(root).at(root)?;
        let template = root.join(Role::New.folder()).join(TEMPLATE_EVENT);
        for kind in MediaKind::ALL {
            let folder = template.join(kind.folder());
            fs::create_dir_all(&folder).at(&folder)?;
        }
        for role in &Role::ALL[1..] {
            let folder = root.join(role.folder());
            fs::create_dir_all(&folder).at(&folder)?;
        }
        if options.example {
            self.write_example(root)?;
        }
        info!("initialized archive at {}", root.display());
        Ok(())
    }

    fn write_example(&self, root: &Path) -> Result<()> {
        let event = root.join(Role::New.folder()).join("2024-10-30_example_event");
        let files = [
            ("jpg/DSC_1234.jpg", 20_000usize),
            ("jpg/DSC_1235.jpg", 21_000),
            ("jpg/DSC_1236.jpg", 22_000),
            ("raw/DSC_1237.NEF", 30_000),
            ("raw/DSC_1238.NEF", 31_000),
        ];
        for (index, (relative, size)) in files.into_iter().enumerate() {
            let path = event.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).at(parent)?;
            }
            let data: Vec<u8> = (0..size).map(|i| ((i * 7 + index * 31) % 251) as u8).collect();
            fs::write(&path, data).at(&path)?;
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_skeleton_once() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("pictures");
        let config = ArchiveConfig::default();
        let workflow = Workflow::new(&config);
        workflow.init(&root, InitOptions::default()).unwrap();
        for folder in ["0_new/template/raw", "0_new/template/audio", "1_original", "4_print"] {
            assert!(root.join(folder).is_dir(), "{folder}");
        }
        let err = workflow.init(&root, InitOptions::default()).unwrap_err();
        assert!(matches!(err, Error::PreconditionNotMet(_)));
    }

    #[test]
    fn example_event_passes_staging_checks() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("pictures");
        let config = ArchiveConfig::default();
        Workflow::new(&config)
            .init(&root, InitOptions { example: true })
            .unwrap();
        Checker::new(&config)
            .run(&root.join("0_new/2024-10-30_example_event"), &CheckOptions::default())
            .unwrap();
    }

    #[test]
    fn stage_requires_direct_child_of_staging() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("0_new/2024-10-30_a")).unwrap();
        fs::create_dir_all(dir.path().join("1_original")).unwrap();
        let config = ArchiveConfig::default();
        let workflow = Workflow::new(&config);

        let event = workflow
            .stage_new_archive(&dir.path().join("0_new/2024-11-01_b"))
            .unwrap();
        assert!(event.join("video").is_dir());

        assert!(workflow
            .stage_new_archive(&dir.path().join("0_new/2024-10-30_a/nested"))
            .is_err());
        assert!(workflow
            .stage_new_archive(&dir.path().join("1_original/2024-11-01_b"))
            .is_err());
        assert!(matches!(
            workflow.stage_new_archive(&dir.path().join("0_new/bad name")),
            Err(Error::NameViolation { .. })
        ));
    }

    #[test]
    fn import_needs_a_year() {
        let dir = tempdir().unwrap();
        let event = dir.path().join("0_new/holidays/jpg");
        fs::create_dir_all(&event).unwrap();
        fs::write(event.join("a.jpg"), b"a").unwrap();
        let config = ArchiveConfig::default();
        let workflow = Workflow::new(&config);
        let path = dir.path().join("0_new/holidays");

        let err = workflow
            .import_to_original(&path, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionNotMet(_)));

        let options = ImportOptions {
            year: Some(1850),
            ..ImportOptions::default()
        };
        assert!(workflow.import_to_original(&path, &options).is_err());

        let options = ImportOptions {
            year: Some(2023),
            dry_run: true,
            ..ImportOptions::default()
        };
        let report = workflow.import_to_original(&path, &options).unwrap();
        assert!(report.destination.ends_with("1_original/2023/holidays"));
        assert!(path.exists());
    }

    #[test]
    fn import_only_allows_skipping_raw() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0_new/2024-10-30_trip");
        fs::create_dir_all(&path).unwrap();
        let config = ArchiveConfig::default();
        let options = ImportOptions {
            ignore: [CheckKind::Duplicate].into_iter().collect(),
            ..ImportOptions::default()
        };
        let err = Workflow::new(&config)
            .import_to_original(&path, &options)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
