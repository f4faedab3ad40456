//! One navigation end to end: fetch, validate, swap the header, decompose,
//! reveal. Any failure before the first DOM mutation falls back to a full load.

use std::sync::Arc;

use teletype_core::{NavigationId, Phase, SoundToggleView, SOUND_TOGGLE_ID};
use teletype_logging::{reveal_debug, reveal_info, reveal_warn, with_navigation_id};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::audio::SharedAudio;
use crate::clock::RevealClock;
use crate::decompose::{prepare_destination, Decomposer};
use crate::document::{ParseError, ReplacementDocument, CONTENT_CONTAINER};
use crate::fetch::{Fetcher, ProgressSink};
use crate::live::{DomError, LiveDocument, PendingNotices};
use crate::lock;
use crate::reveal::{RevealError, RevealReport, RevealSink, RevealSteps, RevealTimings, Revealer};
use crate::types::{EngineEvent, FetchError, PageSnapshot, RevealEvent};

#[derive(Debug, Clone, Default)]
pub struct NavigatorConfig {
    pub timings: RevealTimings,
    pub decomposer: Decomposer,
}

/// Everything that sends a navigation down the full-load path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("unusable document: {0}")]
    Parse(#[from] ParseError),
    #[error("live page: {0}")]
    Dom(#[from] DomError),
    #[error("reveal aborted: {0}")]
    Reveal(RevealError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    Revealed {
        report: RevealReport,
        /// Success notices present when the reveal finished.
        notices: PendingNotices,
    },
    FellBack(NavigationFailure),
    Cancelled,
}

pub struct Navigator {
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn RevealClock>,
    audio: SharedAudio,
    live: Arc<Mutex<LiveDocument>>,
    config: NavigatorConfig,
}

struct EventRevealSink<'a> {
    id: NavigationId,
    sink: &'a dyn ProgressSink,
}

impl RevealSink for EventRevealSink<'_> {
    fn record(&self, event: RevealEvent) {
        self.sink.emit(EngineEvent::Reveal { id: self.id, event });
    }
}

impl Navigator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn RevealClock>,
        audio: SharedAudio,
        live: LiveDocument,
        config: NavigatorConfig,
    ) -> Self {
        Self {
            fetcher,
            clock,
            audio,
            live: Arc::new(Mutex::new(live)),
            config,
        }
    }

    pub fn live(&self) -> Arc<Mutex<LiveDocument>> {
        self.live.clone()
    }

    pub fn audio(&self) -> &SharedAudio {
        &self.audio
    }

    pub fn timings(&self) -> &RevealTimings {
        &self.config.timings
    }

    /// Runs one progressive navigation. Only one navigation mutates the page
    /// at a time; a cancelled one stops at its next suspension point.
    pub async fn navigate(
        &self,
        id: NavigationId,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> NavigationOutcome {
        with_navigation_id(id, self.run_navigation(id, url, sink, cancel)).await
    }

    async fn run_navigation(
        &self,
        id: NavigationId,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> NavigationOutcome {
        reveal_info!("navigating to {url}");
        sink.emit(EngineEvent::Progress {
            id,
            phase: Phase::Fetching,
        });

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(id, sink),
            fetched = self.fetcher.fetch(url) => fetched,
        };
        let page = match fetched {
            Ok(page) => page,
            Err(err) => return self.fall_back(id, url, err.into(), sink),
        };
        reveal_debug!("fetched {} bytes from {}", page.byte_len, page.final_url);

        sink.emit(EngineEvent::Progress {
            id,
            phase: Phase::Decomposing,
        });
        let doc = match ReplacementDocument::parse(&page.html) {
            Ok(doc) => doc,
            Err(err) => return self.fall_back(id, url, err.into(), sink),
        };

        let mut live = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(id, sink),
            live = self.live.lock() => live,
        };
        if cancel.is_cancelled() {
            return self.cancelled(id, sink);
        }
        if live.content_container().is_none() {
            return self.fall_back(id, url, DomError::MissingContainer(CONTENT_CONTAINER).into(), sink);
        }

        let prepared = self.apply_head(&mut live, &doc).and_then(|()| {
            let destination = prepare_destination(&mut live, doc.is_wrapped())?;
            Ok(self.config.decomposer.decompose(&doc, &destination))
        });
        let chunks = match prepared {
            Ok(chunks) => chunks,
            Err(err) => return self.fall_back(id, url, err.into(), sink),
        };
        drop(doc);
        reveal_debug!("{} chunks to reveal", chunks.len());
        sink.emit(EngineEvent::Progress {
            id,
            phase: Phase::Revealing,
        });

        let revealer = Revealer::new(self.clock.as_ref(), &self.audio, &self.config.timings);
        let steps = RevealSteps::new(chunks, self.config.timings.clone());
        let reveal_sink = EventRevealSink { id, sink };
        match revealer.run(&mut live, steps, &reveal_sink, cancel).await {
            Ok(report) => {
                let notices = live.pending_notices();
                sink.emit(EngineEvent::Revealed { id });
                sink.emit(EngineEvent::PageSnapshot(snapshot(&live)));
                reveal_info!("revealed {} units", report.units);
                NavigationOutcome::Revealed { report, notices }
            }
            Err(RevealError::Cancelled) => self.cancelled(id, sink),
            Err(err) => self.fall_back(id, url, NavigationFailure::Reveal(err), sink),
        }
    }

    /// Removes the given success notices once the dismiss delay passes,
    /// unless `cancel` fires first. Notices from a page that has since been
    /// replaced are left alone.
    pub async fn dismiss_notices(&self, notices: PendingNotices, cancel: &CancellationToken) {
        if notices.is_empty() {
            return;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = self.clock.sleep(self.config.timings.notice_dismiss) => {}
        }
        let mut live = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            live = self.live.lock() => live,
        };
        if cancel.is_cancelled() {
            return;
        }
        let dismissed = live.dismiss_pending(&notices);
        reveal_debug!("dismissed {dismissed} of {} notices", notices.len());
    }

    /// A standard, non-progressive load: the whole page is replaced at once.
    ///
    /// Takes part in the same fence as progressive navigations: once
    /// `cancel` fires, the page is left as it is. Returns the success
    /// notices of the loaded page.
    pub async fn full_load(
        &self,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> PendingNotices {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.load_superseded(url, sink),
            fetched = self.fetcher.fetch(url) => fetched,
        };
        let page = match fetched {
            Ok(page) => page,
            Err(err) => {
                reveal_warn!("full load of {url} failed: {err}");
                sink.emit(EngineEvent::LoadFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                });
                return PendingNotices::default();
            }
        };

        let mut live = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.load_superseded(url, sink),
            live = self.live.lock() => live,
        };
        if cancel.is_cancelled() {
            return self.load_superseded(url, sink);
        }
        live.replace_with(LiveDocument::from_html(&page.html));
        let enabled = lock(&self.audio).is_enabled();
        let _ = live.bind_sound_toggle(&SoundToggleView::from_enabled(enabled));
        let text = live
            .content_container()
            .map(|main| live.text_content(main))
            .unwrap_or_default();
        sink.emit(EngineEvent::PageLoaded {
            url: page.final_url,
            text,
        });
        sink.emit(EngineEvent::PageSnapshot(snapshot(&live)));
        live.pending_notices()
    }

    /// Applies a sound preference change and re-labels the toggle.
    pub async fn set_sound(&self, enabled: bool, sink: &dyn ProgressSink) {
        lock(&self.audio).set_enabled(enabled);
        let mut live = self.live.lock().await;
        let _ = live.bind_sound_toggle(&SoundToggleView::from_enabled(enabled));
        sink.emit(EngineEvent::PageSnapshot(snapshot(&live)));
    }

    pub fn user_gesture(&self) {
        lock(&self.audio).notify_user_gesture();
    }

    fn apply_head(&self, live: &mut LiveDocument, doc: &ReplacementDocument) -> Result<(), DomError> {
        if let Some(title) = doc.title() {
            live.set_title(title);
        }
        if let Some(header) = doc.header() {
            live.replace_header(header)?;
        }
        let enabled = lock(&self.audio).is_enabled();
        live.bind_sound_toggle(&SoundToggleView::from_enabled(enabled))?;
        Ok(())
    }

    fn fall_back(
        &self,
        id: NavigationId,
        url: &str,
        failure: NavigationFailure,
        sink: &dyn ProgressSink,
    ) -> NavigationOutcome {
        reveal_warn!("falling back to a full load of {url}: {failure}");
        sink.emit(EngineEvent::FellBack {
            id,
            url: url.to_string(),
            reason: failure.to_string(),
        });
        NavigationOutcome::FellBack(failure)
    }

    fn load_superseded(&self, url: &str, sink: &dyn ProgressSink) -> PendingNotices {
        reveal_debug!("full load of {url} superseded");
        sink.emit(EngineEvent::LoadSuperseded {
            url: url.to_string(),
        });
        PendingNotices::default()
    }

    fn cancelled(&self, id: NavigationId, sink: &dyn ProgressSink) -> NavigationOutcome {
        reveal_debug!("navigation superseded");
        sink.emit(EngineEvent::Cancelled { id });
        NavigationOutcome::Cancelled
    }
}

/// Navigation-relevant facts about the live page.
pub fn snapshot(live: &LiveDocument) -> PageSnapshot {
    PageSnapshot {
        title: live.title().to_string(),
        links: live.links(),
        sound_label: live
            .find_by_id(SOUND_TOGGLE_ID)
            .map(|id| live.text_content(id).trim().to_string()),
    }
}
