#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch `url` and reveal it progressively.
    Navigate { id: crate::NavigationId, url: String },
    /// Fence an in-flight navigation before another one starts.
    CancelNavigation { id: crate::NavigationId },
    /// Add a history entry tagged as progressive.
    PushHistory { url: String },
    /// Plain, non-progressive load of `url`.
    FullNavigation { url: String },
    /// Leave the click to its default behavior.
    DefaultAction { href: String, reason: crate::PassReason },
    SetSound { enabled: bool },
    ResumeAudio,
}
