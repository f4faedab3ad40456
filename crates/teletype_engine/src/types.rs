use std::fmt;

use serde::Serialize;
use teletype_core::{LinkClick, NavigationId, Phase};

use crate::audio::ToneRejected;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress {
        id: NavigationId,
        phase: Phase,
    },
    Reveal {
        id: NavigationId,
        event: RevealEvent,
    },
    /// The reveal finished; housekeeping may still run afterwards.
    Revealed {
        id: NavigationId,
    },
    FellBack {
        id: NavigationId,
        url: String,
        reason: String,
    },
    Cancelled {
        id: NavigationId,
    },
    /// A full, non-progressive load completed.
    PageLoaded {
        url: String,
        text: String,
    },
    LoadFailed {
        url: String,
        reason: String,
    },
    /// A full load stopped before touching the page because a later
    /// navigation replaced it.
    LoadSuperseded {
        url: String,
    },
    PageSnapshot(PageSnapshot),
}

/// Navigation-relevant facts about the live page after it settles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSnapshot {
    pub title: String,
    pub links: Vec<LinkClick>,
    pub sound_label: Option<String>,
}

/// One observable step of a progressive reveal.
///
/// `seq` numbers attached units in attach order, starting at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RevealEvent {
    Attached {
        seq: usize,
        nested: bool,
        at_ms: f64,
        tag: Option<String>,
        text: String,
    },
    ToneScheduled {
        seq: usize,
        frequency: f32,
        audio_time_s: f64,
        target_ms: f64,
    },
    ToneSkipped {
        seq: usize,
        reason: String,
    },
    Flashed {
        seq: usize,
        at_ms: f64,
        target_ms: Option<f64>,
    },
    Completed {
        units: usize,
        at_ms: f64,
    },
}

impl RevealEvent {
    pub(crate) fn skipped(seq: usize, reason: ToneRejected) -> Self {
        RevealEvent::ToneSkipped {
            seq,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub html: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
