//! Archive path model: which stage (role) a path belongs to, and which year
//! and event folder it names.

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    New,
    Original,
    Lab,
    Album,
    Print,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Self::New,
        Self::Original,
        Self::Lab,
        Self::Album,
        Self::Print,
    ];

    pub fn folder(self) -> &'static str {
        match self {
            Self::New => "0_new",
            Self::Original => "1_original",
            Self::Lab => "2_lab",
            Self::Album => "3_album",
            Self::Print => "4_print",
        }
    }

    pub fn from_folder(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.folder() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

/// Date prefix of an event folder name (`YYYY-MM-DD_<name>`).
pub fn event_date(name: &str) -> Option<NaiveDate> {
    let (date, rest) = name.split_once('_')?;
    if date.len() != 10 || rest.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn is_year(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePath {
    /// Absolute, canonical path.
    pub path: PathBuf,
    /// Folder holding the role folders.
    pub root: PathBuf,
    pub role: Role,
    pub year: Option<i32>,
    pub event: Option<String>,
    pub is_event_dir: bool,
}

impl ArchivePath {
    /// Parses an existing path. Fails if it does not exist, has no role
    /// folder among its components, or lies outside the configured root.
    pub fn parse(path: &Path, config: &ArchiveConfig) -> Result<Self> {
        let path = path.canonicalize().map_err(|_| {
            Error::precondition(format!("Path does not exist: {}", path.display()))
        })?;

        let mut root = PathBuf::new();
        let mut role = None;
        let mut rest: Vec<String> = Vec::new();
        for component in path.components() {
            if role.is_some() {
                if let Component::Normal(part) = component {
                    rest.push(part.to_string_lossy().into_owned());
                }
                continue;
            }
            if let Component::Normal(part) = component {
                if let Some(found) = part.to_str().and_then(Role::from_folder) {
                    role = Some(found);
                    continue;
                }
            }
            root.push(component);
        }
        let role = role.ok_or_else(|| {
            Error::precondition(format!(
                "Cannot derive archive role from path: {}",
                path.display()
            ))
        })?;

        if let Some(configured) = &config.root {
            let configured = configured
                .canonicalize()
                .unwrap_or_else(|_| configured.clone());
            if configured != root {
                return Err(Error::precondition(format!(
                    "Path {} is outside the archive root {}",
                    path.display(),
                    configured.display()
                )));
            }
        }

        let mut year = None;
        let mut event = None;
        let mut is_event_dir = false;
        if role == Role::New {
            // everything directly below 0_new is an event, dated or not
            if let Some(first) = rest.first() {
                event = Some(first.clone());
                is_event_dir = rest.len() == 1;
            }
        } else {
            for (index, part) in rest.iter().enumerate() {
                if year.is_none() && event.is_none() && is_year(part) {
                    year = part.parse().ok();
                } else if event.is_none() && event_date(part).is_some() {
                    event = Some(part.clone());
                    is_event_dir = index + 1 == rest.len();
                }
            }
        }
        if year.is_none() {
            use chrono::Datelike;
            year = event.as_deref().and_then(event_date).map(|d| d.year());
        }

        let parsed = Self {
            path,
            root,
            role,
            year,
            event,
            is_event_dir,
        };
        debug!(?parsed, "archive path");
        Ok(parsed)
    }

    pub fn role_dir(&self, role: Role) -> PathBuf {
        self.root.join(role.folder())
    }

    /// Path below the role folder, e.g. `2024/2024-10-30_trip`.
    pub fn within_role(&self) -> &Path {
        self.path
            .strip_prefix(self.role_dir(self.role))
            .unwrap_or(Path::new(""))
    }

    /// Renders `path` relative to the archive root for log output.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn event_dates() {
        assert!(event_date("2024-10-30_trip").is_some());
        assert!(event_date("2024-02-30_trip").is_none());
        assert!(event_date("2024-10-30_").is_none());
        assert!(event_date("trip").is_none());
        assert!(event_date("2024").is_none());
    }

    #[test]
    fn parses_original_event() {
        let dir = tempdir().unwrap();
        let event = dir.path().join("1_original/2024/2024-10-30_trip");
        fs::create_dir_all(event.join("jpg")).unwrap();
        let config = ArchiveConfig::default();

        let parsed = ArchivePath::parse(&event, &config).unwrap();
        assert_eq!(parsed.role, Role::Original);
        assert_eq!(parsed.year, Some(2024));
        assert_eq!(parsed.event.as_deref(), Some("2024-10-30_trip"));
        assert!(parsed.is_event_dir);
        assert_eq!(parsed.root, dir.path().canonicalize().unwrap());
        assert_eq!(parsed.within_role(), Path::new("2024/2024-10-30_trip"));

        let sub = ArchivePath::parse(&event.join("jpg"), &config).unwrap();
        assert!(!sub.is_event_dir);
        assert_eq!(sub.event.as_deref(), Some("2024-10-30_trip"));
    }

    #[test]
    fn undated_new_event_has_no_year() {
        let dir = tempdir().unwrap();
        let event = dir.path().join("0_new/holidays");
        fs::create_dir_all(&event).unwrap();
        let parsed = ArchivePath::parse(&event, &ArchiveConfig::default()).unwrap();
        assert_eq!(parsed.role, Role::New);
        assert_eq!(parsed.event.as_deref(), Some("holidays"));
        assert!(parsed.is_event_dir);
        assert_eq!(parsed.year, None);
    }

    #[test]
    fn rejects_paths_without_role_or_outside_root() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("elsewhere")).unwrap();
        let err = ArchivePath::parse(&dir.path().join("elsewhere"), &ArchiveConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionNotMet(_)));

        let archive = dir.path().join("archive");
        let other = dir.path().join("other");
        fs::create_dir_all(archive.join("0_new")).unwrap();
        fs::create_dir_all(other.join("0_new")).unwrap();
        let config = ArchiveConfig {
            root: Some(archive),
            ..ArchiveConfig::default()
        };
        assert!(ArchivePath::parse(&other.join("0_new"), &config).is_err());
    }

    #[test]
    fn missing_path_is_a_precondition_error() {
        let dir = tempdir().unwrap();
        let err = ArchivePath::parse(&dir.path().join("nope"), &ArchiveConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
