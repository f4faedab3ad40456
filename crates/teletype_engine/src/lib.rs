//! Teletype engine: fetching, the live page, decomposition, audio and the
//! progressive reveal driver.
use std::sync::{Mutex, MutexGuard};

mod audio;
mod clock;
mod decode;
mod decompose;
mod document;
mod engine;
mod fetch;
mod fragment;
mod live;
mod navigator;
mod persist;
mod reveal;
mod types;

pub use audio::*;
pub use clock::{
    AudioTime, PresentationClock, PresentationTime, RevealClock, TokioClock, VirtualClock,
    DEFAULT_FRAME_RATE,
};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use decompose::{prepare_destination, reassemble, Chunk, Decomposer, Destination, Granularity};
pub use document::{ParseError, ReplacementDocument, CONTENT_CONTAINER, WRAPPER_CLASS};
pub use engine::NavigatorHandle;
pub use fetch::{ChannelProgressSink, FetchSettings, Fetcher, ProgressSink, ReqwestFetcher};
pub use fragment::{ElementFragment, Fragment};
pub use live::{
    DomError, LiveDocument, LiveElement, LiveNode, PendingNotices, CHUNK_CLASS, FLASH_CLASS,
    SHOWN_CLASS,
};
pub use navigator::{snapshot, NavigationFailure, NavigationOutcome, Navigator, NavigatorConfig};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use reveal::{
    AttachTarget, RevealError, RevealReport, RevealSink, RevealStep, RevealSteps, RevealTimings,
    Revealer,
};
pub use types::{EngineEvent, FailureKind, FetchError, FetchedPage, PageSnapshot, RevealEvent};

pub use ego_tree::NodeId;

/// Locks a std mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
