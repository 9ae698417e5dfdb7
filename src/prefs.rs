//! Persisted user preferences

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::learn::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Download right after a scan without asking
    #[serde(default)]
    pub auto_download: bool,
}

/// `$XDG_CONFIG_HOME/coursedl/preferences.json` or the platform equivalent
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coursedl")
        .join("preferences.json")
}

impl Preferences {
    /// Load preferences, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        tracing::debug!(path = ?path, "Preferences saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let prefs = Preferences::load(&dir.path().join("nope.json")).unwrap();
        assert!(!prefs.auto_download);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        Preferences { auto_download: true }.save(&path).unwrap();
        assert!(Preferences::load(&path).unwrap().auto_download);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"autoDownload\": true"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Preferences::load(&path).is_err());
    }
}
