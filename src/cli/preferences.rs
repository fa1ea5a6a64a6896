use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PREFERENCES_FILE: &str = "preferences.yaml";

/// Choices remembered between `convert` runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UserPreferences {
    pub source_currency: String,
    pub selected_currencies: Vec<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        UserPreferences {
            source_currency: "USD".to_string(),
            selected_currencies: Vec::new(),
        }
    }
}

pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        PreferenceStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config.default_data_path()?.join(PREFERENCES_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable preferences load as defaults.
    pub fn load(&self) -> UserPreferences {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No preferences at {}: {e}", self.path.display());
                return UserPreferences::default();
            }
        };

        match serde_yaml::from_str(&content) {
            Ok(preferences) => preferences,
            Err(e) => {
                warn!(
                    error = %e,
                    "Ignoring malformed preferences at {}",
                    self.path.display()
                );
                UserPreferences::default()
            }
        }
    }

    pub fn save(&self, preferences: &UserPreferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content =
            serde_yaml::to_string(preferences).context("Failed to serialize preferences")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write preferences to {}", self.path.display()))?;
        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path().join(PREFERENCES_FILE));
        assert_eq!(store.load(), UserPreferences::default());
        assert_eq!(store.load().source_currency, "USD");
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PreferenceStore::new(dir.path().join("nested").join(PREFERENCES_FILE));
        let preferences = UserPreferences {
            source_currency: "EUR".to_string(),
            selected_currencies: vec!["GBP".to_string(), "BTC".to_string()],
        };

        store.save(&preferences)?;
        assert_eq!(store.load(), preferences);
        Ok(())
    }

    #[test]
    fn test_malformed_file_loads_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "selected_currencies: {not: [a list")?;

        assert_eq!(PreferenceStore::new(&path).load(), UserPreferences::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "selected_currencies: [JPY]\n")?;

        let preferences = PreferenceStore::new(&path).load();
        assert_eq!(preferences.source_currency, "USD");
        assert_eq!(preferences.selected_currencies, vec!["JPY".to_string()]);
        Ok(())
    }
}
