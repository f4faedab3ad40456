use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(self) -> bool {
        self.meta || self.ctrl || self.shift || self.alt
    }
}

/// A click on a hyperlink, with the anchor attributes that affect interception.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkClick {
    /// Raw `href` attribute value, possibly relative.
    pub href: String,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    /// Anchor carries a `download` attribute.
    pub download: bool,
    /// Value of the anchor's `target` attribute, if any.
    pub target: Option<String>,
    /// Anchor carries the `data-no-pjax` opt-out marker.
    pub opt_out: bool,
}

impl LinkClick {
    pub fn primary(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    ModifiedClick,
    Download,
    ExplicitTarget,
    FragmentOnly,
    InvalidHref,
    CrossOrigin,
    OptOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// Default navigation is suppressed; the controller navigates to this URL.
    Intercept(Url),
    /// The click keeps its default browser behavior.
    PassThrough(PassReason),
}

/// Decides whether a link click is taken over by progressive navigation.
///
/// Checks run in a fixed order and the first failing rule wins, so the
/// reason reported for a click is stable.
pub fn classify_click(click: &LinkClick, current: &Url) -> LinkDecision {
    if click.button != MouseButton::Primary || click.modifiers.any() {
        return LinkDecision::PassThrough(PassReason::ModifiedClick);
    }
    if click.download {
        return LinkDecision::PassThrough(PassReason::Download);
    }
    if click.target.as_deref().is_some_and(|t| !t.is_empty()) {
        return LinkDecision::PassThrough(PassReason::ExplicitTarget);
    }
    let href = click.href.trim();
    if href.is_empty() || href.starts_with('#') {
        return LinkDecision::PassThrough(PassReason::FragmentOnly);
    }
    let resolved = match current.join(href) {
        Ok(url) => url,
        Err(_) => return LinkDecision::PassThrough(PassReason::InvalidHref),
    };
    if resolved.origin() != current.origin() {
        return LinkDecision::PassThrough(PassReason::CrossOrigin);
    }
    if click.opt_out {
        return LinkDecision::PassThrough(PassReason::OptOut);
    }
    LinkDecision::Intercept(resolved)
}
