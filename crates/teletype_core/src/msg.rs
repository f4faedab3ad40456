#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A page was loaded the ordinary way (startup or after a fallback).
    PageLoaded { url: String },
    /// User asked for a URL directly (address bar).
    OpenRequested { url: String },
    /// User clicked a hyperlink.
    LinkActivated(crate::LinkClick),
    /// Back/forward moved the history cursor to `url`.
    HistoryPopped { url: String },
    /// Engine reached a new phase for a navigation.
    NavigationProgress {
        id: crate::NavigationId,
        phase: crate::Phase,
    },
    /// Engine finished revealing a navigation.
    NavigationRevealed { id: crate::NavigationId },
    /// Engine gave up on the progressive path for a navigation.
    NavigationFellBack {
        id: crate::NavigationId,
        reason: String,
    },
    /// Stored sound preference was read at startup.
    SoundPreferenceLoaded(bool),
    /// User pressed the sound toggle.
    SoundToggled,
    /// First pointer or key gesture on the page.
    UserGesture,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
