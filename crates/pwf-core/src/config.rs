//! Archive configuration.
//!
//! Every component receives an `ArchiveConfig` explicitly. Values come from
//! the built-in defaults, an optional JSON file and the `PWF_HOME`
//! environment variable, in that order.

use crate::error::{Error, IoResultExt, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const HOME_ENV: &str = "PWF_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
    Blake3,
}

impl ChecksumAlgorithm {
    /// Extension of the manifest file written next to a protected directory.
    pub fn manifest_extension(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Blake3 => "b3",
        }
    }
}

/// Fast content fingerprint used by the duplicate check. CRC32 admits
/// collisions; a clash between two files of equal size is reported as a
/// duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fingerprint {
    Crc32,
    Blake3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuplicateSettings {
    pub fingerprint: Fingerprint,
    /// Only the first `prefix_bytes` of each file are fingerprinted; `None`
    /// reads whole files.
    pub prefix_bytes: Option<u64>,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self {
            fingerprint: Fingerprint::Crc32,
            prefix_bytes: Some(8000),
        }
    }
}

/// The typed subfolders of an event folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Raw,
    Jpg,
    Video,
    Audio,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [Self::Raw, Self::Jpg, Self::Video, Self::Audio];

    pub fn folder(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Jpg => "jpg",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Raw => "RAW images",
            Self::Jpg => "JPG images",
            Self::Video => "Videos",
            Self::Audio => "Audio files",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Archive root (the folder holding `0_new`, `1_original`, ...). When
    /// unset the root is derived from each path.
    pub root: Option<PathBuf>,
    /// Characters allowed in names besides ASCII letters and digits.
    pub legal_characters: String,
    /// Substitutions applied in order when fixing illegal names.
    pub name_replacements: Vec<(String, String)>,
    pub raw_extensions: Vec<String>,
    pub jpg_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub checksum: ChecksumAlgorithm,
    pub duplicates: DuplicateSettings,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: None,
            legal_characters: "_äöüÄÖÜé~.-".into(),
            name_replacements: vec![
                (" ".into(), "_".into()),
                ("&".into(), "und".into()),
                ("-_".into(), "".into()),
            ],
            raw_extensions: strings(&["NEF", "NRW", "CR2"]),
            jpg_extensions: strings(&["jpg", "jpeg", "JPG", "JPEG"]),
            video_extensions: strings(&["MOV", "mov", "mp4", "MP4", "mpeg"]),
            audio_extensions: strings(&["wav", "WAV", "mp3"]),
            checksum: ChecksumAlgorithm::Md5,
            duplicates: DuplicateSettings::default(),
        }
    }
}

impl ArchiveConfig {
    /// Loads defaults, then the config file (if any), then `PWF_HOME`.
    pub fn load() -> Result<Self> {
        let mut config = match paths::config_file() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        if let Some(home) = std::env::var_os(HOME_ENV) {
            config.root = Some(PathBuf::from(home));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).at(path)?;
        let config: Self = serde_json::from_str(&data)?;
        debug!("configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self
            .legal_characters
            .chars()
            .any(|c| c == '/' || c == '\0')
        {
            return Err(Error::Config(
                "legal_characters must not contain path separators".into(),
            ));
        }
        if self.name_replacements.iter().any(|(from, _)| from.is_empty()) {
            return Err(Error::Config(
                "name_replacements must not replace the empty string".into(),
            ));
        }
        let mut seen = std::collections::HashMap::new();
        for kind in MediaKind::ALL {
            for ext in self.extensions(kind) {
                if let Some(other) = seen.insert(ext.as_str(), kind) {
                    return Err(Error::Config(format!(
                        "extension '{ext}' is listed for both {} and {}",
                        other.folder(),
                        kind.folder()
                    )));
                }
            }
        }
        if self.duplicates.prefix_bytes == Some(0) {
            return Err(Error::Config(
                "duplicates.prefix_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn extensions(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Raw => &self.raw_extensions,
            MediaKind::Jpg => &self.jpg_extensions,
            MediaKind::Video => &self.video_extensions,
            MediaKind::Audio => &self.audio_extensions,
        }
    }

    /// Media kind (and hence the only allowed folder) for an extension.
    pub fn media_kind(&self, extension: &str) -> Option<MediaKind> {
        MediaKind::ALL
            .into_iter()
            .find(|kind| self.extensions(*kind).iter().any(|e| e == extension))
    }

    pub fn is_raw(&self, extension: &str) -> bool {
        self.raw_extensions.iter().any(|e| e == extension)
    }

    pub fn is_legal_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.legal_characters.contains(c)
    }

    pub fn is_legal_name(&self, name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| self.is_legal_char(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = ArchiveConfig::default();
        config.validate().unwrap();
        assert_eq!(config.media_kind("NEF"), Some(MediaKind::Raw));
        assert_eq!(config.media_kind("mp3"), Some(MediaKind::Audio));
        assert_eq!(config.media_kind("txt"), None);
        assert!(config.is_legal_name("2024-10-30_Zürich~v2.jpg"));
        assert!(!config.is_legal_name("my file.jpg"));
        assert!(!config.is_legal_name(""));
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"checksum": "sha256", "raw_extensions": ["ARW"]}"#).unwrap();
        let config = ArchiveConfig::from_file(&path).unwrap();
        assert_eq!(config.checksum, ChecksumAlgorithm::Sha256);
        assert!(config.is_raw("ARW"));
        assert!(!config.is_raw("NEF"));
        assert_eq!(config.jpg_extensions, ArchiveConfig::default().jpg_extensions);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"checksums": "md5"}"#).unwrap();
        assert!(matches!(
            ArchiveConfig::from_file(&path),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn overlapping_extensions_fail_validation() {
        let mut config = ArchiveConfig::default();
        config.audio_extensions.push("MOV".into());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
