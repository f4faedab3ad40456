use std::sync::Mutex;

use crate::lock;

/// Storage key of the sound-enabled preference.
pub const SOUND_PREFERENCE_KEY: &str = "sound_enabled";

/// Persists the single sound-enabled flag. `None` means never stored.
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Option<bool>;
    fn save(&self, enabled: bool);
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    value: Mutex<Option<bool>>,
    writes: Mutex<usize>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: Option<bool>) -> Self {
        Self {
            value: Mutex::new(initial),
            writes: Mutex::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        *lock(&self.writes)
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Option<bool> {
        *lock(&self.value)
    }

    fn save(&self, enabled: bool) {
        *lock(&self.value) = Some(enabled);
        *lock(&self.writes) += 1;
    }
}
