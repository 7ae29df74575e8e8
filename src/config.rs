use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

const FILE_LOADING_ENV: &str = "STACKCHECK_FILE_LOADING";
const DISPLAY_BUTTONS_ENV: &str = "STACKCHECK_DISPLAY_BUTTONS";

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unable to locate configuration directory")]
    MissingConfigPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "enabled")]
    pub file_loading_enabled: bool,
    #[serde(default = "enabled")]
    pub display_buttons: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_loading_enabled: true,
            display_buttons: true,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = settings_file_path()?;
        let mut settings = Self::load_or_init(&path)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let payload = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&payload)?)
        } else {
            Ok(Self::default())
        }
    }

    // First run writes the defaults so the flags can be edited by hand.
    fn load_or_init(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let settings = Self::default();
        match settings.save_to(path) {
            Ok(()) => log::info!("Wrote default settings to {}", path.display()),
            Err(err) => log::warn!("Could not write {}: {err}", path.display()),
        }
        Ok(settings)
    }

    fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(FILE_LOADING_ENV).as_deref().and_then(parse_flag) {
            self.file_loading_enabled = value;
        }
        if let Some(value) = lookup(DISPLAY_BUTTONS_ENV).as_deref().and_then(parse_flag) {
            self.display_buttons = value;
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("ignoring unrecognised flag value `{other}`");
            None
        }
    }
}

fn settings_file_path() -> Result<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("com", "Stackcheck", "Stackcheck")
        .ok_or(SettingsError::MissingConfigPath)?;
    Ok(proj_dirs.config_dir().join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            file_loading_enabled: false,
            display_buttons: true,
        };

        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let settings = Settings::load_or_init(&path).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "file_loading_enabled": false }"#).unwrap();

        let settings = Settings::load_or_init(&path).unwrap();

        assert!(!settings.file_loading_enabled);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{ "file_loading_enabled": false }"#
        );
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "display_buttons": false }"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert!(settings.file_loading_enabled);
        assert!(!settings.display_buttons);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn environment_overrides_flags() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            FILE_LOADING_ENV => Some("0".to_string()),
            DISPLAY_BUTTONS_ENV => Some("maybe".to_string()),
            _ => None,
        });

        assert!(!settings.file_loading_enabled);
        assert!(settings.display_buttons);
    }
}
