use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Directory of the last save, used as the starting point for the next
    /// save dialog. The transcode command itself is never configurable.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    pub fn file_path(data_dir: &PathBuf) -> PathBuf {
        data_dir.join("settings.json")
    }

    pub fn load(data_dir: &PathBuf) -> Self {
        let path = Self::file_path(data_dir);
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str(&contents) {
                    Ok(settings) => return settings,
                    Err(e) => log::warn!("Failed to parse settings: {}, using defaults", e),
                },
                Err(e) => log::warn!("Failed to read settings: {}, using defaults", e),
            }
        }
        Self::default()
    }

    pub fn save(&self, data_dir: &PathBuf) -> Result<(), String> {
        let path = Self::file_path(data_dir);
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(&path, json).map_err(|e| e.to_string())?;
        Ok(())
    }
}
