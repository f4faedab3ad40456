use crate::view_model::{ControllerView, SoundToggleView};

pub type NavigationId = u64;

/// Where the navigation controller currently is.
///
/// `Fallback` is terminal for the navigation that reached it: the page is
/// being loaded the non-progressive way. A later navigation may start from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Decomposing,
    Revealing,
    Fallback,
}

impl Phase {
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Fetching | Phase::Decomposing | Phase::Revealing)
    }
}

/// Whether a navigation adds a history entry or re-renders an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// Link activation or explicit open: push a new entry on success.
    Push,
    /// Back/forward: re-run fetch and reveal against the current entry.
    Replay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub id: NavigationId,
    pub url: String,
    pub mode: NavigationMode,
}

/// Process-wide navigation record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationState {
    current_url: Option<String>,
    progressive: bool,
}

impl NavigationState {
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// True when the current view was reached by progressive replacement.
    pub fn is_progressive(&self) -> bool {
        self.progressive
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    navigation: NavigationState,
    phase: Phase,
    in_flight: Option<InFlight>,
    last_id: NavigationId,
    sound_enabled: bool,
    dirty: bool,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            navigation: NavigationState::default(),
            phase: Phase::Idle,
            in_flight: None,
            last_id: 0,
            // Sound defaults to on until a stored preference says otherwise.
            sound_enabled: true,
            dirty: false,
        }
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    pub fn view(&self) -> ControllerView {
        ControllerView {
            phase: self.phase,
            current_url: self.navigation.current_url.clone(),
            progressive: self.navigation.progressive,
            in_flight: self.in_flight.as_ref().map(|f| f.id),
            sound: SoundToggleView::from_enabled(self.sound_enabled),
            dirty: self.dirty,
        }
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Starts a new navigation and returns the in-flight navigation it replaces.
    pub(crate) fn begin(&mut self, url: String, mode: NavigationMode) -> (NavigationId, Option<InFlight>) {
        self.last_id += 1;
        let id = self.last_id;
        let previous = self.in_flight.replace(InFlight { id, url, mode });
        self.phase = Phase::Fetching;
        self.dirty = true;
        (id, previous)
    }

    /// Returns the in-flight navigation only if `id` is still the current one.
    pub(crate) fn current(&self, id: NavigationId) -> Option<&InFlight> {
        self.in_flight.as_ref().filter(|f| f.id == id)
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.dirty = true;
        }
    }

    pub(crate) fn commit_progressive(&mut self, url: String) {
        self.navigation.current_url = Some(url);
        self.navigation.progressive = true;
        self.dirty = true;
    }

    pub(crate) fn commit_full_load(&mut self, url: String) {
        self.navigation.current_url = Some(url);
        self.navigation.progressive = false;
        self.dirty = true;
    }

    pub(crate) fn finish(&mut self, phase: Phase) -> Option<InFlight> {
        self.phase = phase;
        self.dirty = true;
        self.in_flight.take()
    }

    pub(crate) fn set_sound_enabled(&mut self, enabled: bool) {
        if self.sound_enabled != enabled {
            self.sound_enabled = enabled;
            self.dirty = true;
        }
    }
}
