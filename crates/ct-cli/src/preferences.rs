//! User preferences: category rules, sleep markers, productive categories.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use ct_core::{RuleTable, SleepPreferences};
use serde::Deserialize;

/// Contents of the preferences JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Ordered category rule table.
    pub categories: RuleTable,
    pub sleep: SleepPreferences,
    /// Category paths (or top-level names) counted as productive.
    pub productive_categories: Vec<String>,
}

impl Preferences {
    /// Reads preferences from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "no preferences file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("preferences.json")).unwrap();
        assert!(prefs.categories.is_empty());
        assert!(!prefs.sleep.has_markers());
        assert!(prefs.productive_categories.is_empty());
    }

    #[test]
    fn parses_rules_and_sleep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(
            &path,
            r#"{
                "categories": {
                    "work": {"title": "Work", "patterns": [{"regex": "Standup"}]},
                    "health": {"title": "Health", "patterns": [{"regex": "Gym"}]}
                },
                "sleep": {"start_marker": "Bed", "end_marker": "Up", "daily_sleep_hours": 7.5},
                "productive_categories": ["work"]
            }"#,
        )
        .unwrap();

        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.categories.categories().len(), 2);
        assert!(prefs.sleep.has_markers());
        assert_eq!(prefs.sleep.post_midnight_hour, 10);
        assert_eq!(prefs.productive_categories, vec!["work"]);
    }

    #[test]
    fn invalid_pattern_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(
            &path,
            r#"{"categories": {"x": {"title": "X", "patterns": [{"regex": "("}]}}}"#,
        )
        .unwrap();

        let err = Preferences::load(&path).unwrap_err();
        assert!(err.to_string().contains("preferences.json"));
    }
}
