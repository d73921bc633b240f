//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + template registry):
//!   Windows: %APPDATA%\cardcraft\
//!   macOS:   ~/Library/Application Support/cardcraft/
//!   Linux:   ~/.config/cardcraft/
//!
//! Data dir (generated audio artifacts):
//!   Windows: %LOCALAPPDATA%\cardcraft\
//!   macOS:   ~/Library/Application Support/cardcraft/
//!   Linux:   ~/.local/share/cardcraft/

use std::path::PathBuf;

const APP_NAME: &str = "cardcraft";

/// Per-application subdirectory of a platform base dir, falling back to the
/// working directory when the platform cannot provide one (extremely rare).
fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME)
}

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `templates.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `templates.json` (the prompt template registry).
    pub templates_file: PathBuf,
    /// Directory for content-addressed audio artifacts.
    pub audio_dir: PathBuf,
}

impl AppPaths {
    /// Resolves all paths using the `dirs` crate.
    pub fn new() -> Self {
        let config_dir = app_dir(dirs::config_dir());
        let data_dir = app_dir(dirs::data_local_dir());

        Self {
            settings_file: config_dir.join("settings.toml"),
            templates_file: config_dir.join("templates.json"),
            audio_dir: data_dir.join("audio"),
            config_dir,
        }
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
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.audio_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .templates_file
            .file_name()
            .is_some_and(|n| n == "templates.json"));
    }

    #[test]
    fn every_path_lives_under_the_app_dir() {
        let paths = AppPaths::new();
        for path in [
            &paths.config_dir,
            &paths.settings_file,
            &paths.templates_file,
            &paths.audio_dir,
        ] {
            assert!(
                path.components().any(|c| c.as_os_str() == APP_NAME),
                "{} lacks the {APP_NAME} segment",
                path.display()
            );
        }
    }

    #[test]
    fn app_dir_falls_back_to_working_directory() {
        assert_eq!(app_dir(None), PathBuf::from(".").join(APP_NAME));
        assert_eq!(
            app_dir(Some(PathBuf::from("/base"))),
            PathBuf::from("/base").join(APP_NAME)
        );
    }
}
