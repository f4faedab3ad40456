use crate::{NavigationId, Phase};

/// Element id of the sound toggle control inside the page header.
pub const SOUND_TOGGLE_ID: &str = "sound-toggle";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerView {
    pub phase: Phase,
    pub current_url: Option<String>,
    pub progressive: bool,
    pub in_flight: Option<NavigationId>,
    pub sound: SoundToggleView,
    pub dirty: bool,
}

/// Text label and pressed state of the sound toggle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoundToggleView {
    pub label: String,
    pub pressed: bool,
}

impl SoundToggleView {
    pub fn from_enabled(enabled: bool) -> Self {
        let state = if enabled { "On" } else { "Off" };
        Self {
            label: format!("SFX: {state}"),
            pressed: enabled,
        }
    }

    /// Value for the accessible `aria-pressed` attribute.
    pub fn aria_pressed(&self) -> &'static str {
        if self.pressed {
            "true"
        } else {
            "false"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_labels_follow_enabled_flag() {
        let on = SoundToggleView::from_enabled(true);
        assert_eq!(on.label, "SFX: On");
        assert_eq!(on.aria_pressed(), "true");

        let off = SoundToggleView::from_enabled(false);
        assert_eq!(off.label, "SFX: Off");
        assert_eq!(off.aria_pressed(), "false");
    }
}
