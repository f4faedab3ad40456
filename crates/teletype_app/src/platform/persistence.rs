use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use teletype_engine::{AtomicFileWriter, PreferenceStore, SOUND_PREFERENCE_KEY};
use teletype_logging::{reveal_error, reveal_info, reveal_warn};

const PREFERENCES_FILENAME: &str = ".teletype_prefs.ron";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedPreferences {
    #[serde(rename = "sound_enabled", default)]
    sound_enabled: Option<bool>,
}

/// Sound preference stored as a small RON file in the state directory.
///
/// Reads once on construction; every save rewrites the file atomically.
pub(crate) struct RonPreferenceStore {
    dir: PathBuf,
    cached: Mutex<Option<bool>>,
}

impl RonPreferenceStore {
    pub(crate) fn open(dir: &Path) -> Self {
        let cached = read_preferences(&dir.join(PREFERENCES_FILENAME)).sound_enabled;
        Self {
            dir: dir.to_path_buf(),
            cached: Mutex::new(cached),
        }
    }
}

impl PreferenceStore for RonPreferenceStore {
    fn load(&self) -> Option<bool> {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, enabled: bool) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(enabled);

        let prefs = PersistedPreferences {
            sound_enabled: Some(enabled),
        };
        let pretty = ron::ser::PrettyConfig::new();
        let content = match ron::ser::to_string_pretty(&prefs, pretty) {
            Ok(text) => text,
            Err(err) => {
                reveal_error!("Failed to serialize preferences: {}", err);
                return;
            }
        };

        let writer = AtomicFileWriter::new(self.dir.clone());
        if let Err(err) = writer.write(PREFERENCES_FILENAME, content) {
            reveal_error!("Failed to write {} to {:?}: {}", SOUND_PREFERENCE_KEY, self.dir, err);
        }
    }
}

fn read_preferences(path: &Path) -> PersistedPreferences {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return PersistedPreferences::default();
        }
        Err(err) => {
            reveal_warn!("Failed to read preferences from {:?}: {}", path, err);
            return PersistedPreferences::default();
        }
    };

    match ron::from_str(&content) {
        Ok(prefs) => {
            reveal_info!("Loaded preferences from {:?}", path);
            prefs
        }
        Err(err) => {
            reveal_warn!("Failed to parse preferences from {:?}: {}", path, err);
            PersistedPreferences::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_means_never_stored() {
        let temp = TempDir::new().unwrap();
        let store = RonPreferenceStore::open(temp.path());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn saved_preference_survives_reopen() {
        let temp = TempDir::new().unwrap();
        RonPreferenceStore::open(temp.path()).save(false);

        let reopened = RonPreferenceStore::open(temp.path());
        assert_eq!(reopened.load(), Some(false));
        let text = fs::read_to_string(temp.path().join(PREFERENCES_FILENAME)).unwrap();
        assert!(text.contains("sound_enabled"));
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PREFERENCES_FILENAME), "not ron at all {").unwrap();
        assert_eq!(RonPreferenceStore::open(temp.path()).load(), None);
    }
}
