//! Platform paths for persisted settings, resolved via the `dirs` crate.
//!
//!   Windows: %APPDATA%\meeting-scribe\settings.toml
//!   macOS:   ~/Library/Application Support/meeting-scribe/settings.toml
//!   Linux:   ~/.config/meeting-scribe/settings.toml

use std::path::{Path, PathBuf};

const APP_DIR: &str = "meeting-scribe";
const SETTINGS_FILE: &str = "settings.toml";

/// Resolved application directory, with accessors for the files inside it.
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// Resolve the platform config directory.  When the platform cannot
    /// provide one (extremely rare) the current directory is used so the
    /// app still works.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: base.join(APP_DIR),
        }
    }

    /// Use an explicit root instead of the platform default (tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The application's config directory.
    pub fn config_dir(&self) -> &Path {
        &self.root
    }

    /// Full path of `settings.toml`.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_lives_under_config_dir() {
        let paths = AppPaths::new();
        let file = paths.settings_file();
        assert!(file.starts_with(paths.config_dir()));
        assert_eq!(file.file_name().and_then(|n| n.to_str()), Some("settings.toml"));
    }

    #[test]
    fn explicit_root_is_honoured() {
        let paths = AppPaths::with_root("/tmp/scribe-test");
        assert_eq!(
            paths.settings_file(),
            PathBuf::from("/tmp/scribe-test/settings.toml")
        );
    }
}
