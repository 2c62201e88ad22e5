use crate::config::ArchiveConfig;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const APP_QUALIFIER: &str = "org";
pub const APP_ORG: &str = "pwf";
pub const APP_NAME: &str = "pwf";

pub const CONFIG_ENV: &str = "PWF_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Location of the optional JSON config file. `PWF_CONFIG` wins over the
/// platform config directory.
pub fn config_file() -> Option<PathBuf> {
    if let Some(override_path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(override_path));
    }
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Binds a relative user path to the archive: if it does not exist below the
/// working directory but does below the configured root, the latter is used.
pub fn resolve(config: &ArchiveConfig, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    match &config.root {
        Some(root) if root.join(path).exists() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// Like [`resolve`] for a path that is about to be created: only its parent
/// has to exist.
pub fn resolve_new(config: &ArchiveConfig, path: &Path) -> PathBuf {
    let parent_exists = |p: &Path| match p.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.exists(),
        _ => true,
    };
    if path.is_absolute() || parent_exists(path) {
        return path.to_path_buf();
    }
    match &config.root {
        Some(root) if parent_exists(&root.join(path)) => root.join(path),
        _ => path.to_path_buf(),
    }
}
