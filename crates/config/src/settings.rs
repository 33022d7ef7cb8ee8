// Export settings
// Loaded from ~/.config/casegrid/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Export defaults, used when a request leaves the field out
    #[serde(rename = "export.groupingStrategy")]
    pub grouping_strategy: String,

    #[serde(rename = "export.includeSteps")]
    pub include_steps: bool,

    #[serde(rename = "export.language")]
    pub language: String,

    // Template
    #[serde(rename = "template.path", skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,

    #[serde(rename = "template.sheetName")]
    pub template_sheet_name: String,

    /// 0-based row where data rows are inserted
    #[serde(rename = "template.startRow")]
    pub template_start_row: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grouping_strategy: "category".to_string(),
            include_steps: true,
            language: "en".to_string(),
            template_path: None,
            template_sheet_name: "Test Cases".to_string(),
            template_start_row: 2,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casegrid");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Self::default();
        }
        Self::load_from(&path)
    }

    /// Load settings from an explicit file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                log::warn!("Error parsing {}: {}. Using default settings", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("Error reading {}: {}. Using default settings", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }
}
