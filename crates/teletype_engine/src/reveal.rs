//! Progressive reveal: a lazy step sequence and the driver that plays it.
//!
//! [`RevealSteps`] turns a chunk list into attach and settle steps. The
//! [`Revealer`] consumes them one at a time against the live page, pairs
//! every attach with a tone and a one-frame flash, and suspends only in
//! settle delays and frame waits.

use std::collections::VecDeque;
use std::time::Duration;

use ego_tree::NodeId;
use teletype_logging::{reveal_debug, reveal_trace};
use tokio_util::sync::CancellationToken;

use crate::audio::{SharedAudio, TonePitch, ToneRejected};
use crate::clock::{PresentationTime, RevealClock};
use crate::decompose::Chunk;
use crate::fragment::Fragment;
use crate::live::{DomError, LiveDocument, CHUNK_CLASS, FLASH_CLASS, SHOWN_CLASS};
use crate::lock;
use crate::types::RevealEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct RevealTimings {
    /// Pause after a top-level chunk without follow items.
    pub chunk_settle: Duration,
    /// Pause after each follow item.
    pub item_settle: Duration,
    /// Pause between a shell and its first follow item.
    pub follow_lead: Duration,
    /// Pause after the follow sequence before the next top-level chunk.
    pub follow_trail: Duration,
    /// How far ahead each paired tone is scheduled.
    pub tone_lead: Duration,
    /// A flash may fire this early relative to its tone.
    pub frame_tolerance: Duration,
    /// Delay before success notices remove themselves.
    pub notice_dismiss: Duration,
}

impl Default for RevealTimings {
    fn default() -> Self {
        Self {
            chunk_settle: Duration::from_millis(70),
            item_settle: Duration::from_millis(50),
            follow_lead: Duration::from_millis(60),
            follow_trail: Duration::from_millis(60),
            tone_lead: Duration::from_millis(70),
            frame_tolerance: Duration::from_millis(1),
            notice_dismiss: Duration::from_millis(4000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachTarget {
    Parent(NodeId),
    /// The most recently attached top-level unit.
    CurrentShell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    Attach {
        target: AttachTarget,
        fragment: Fragment,
        pitch: TonePitch,
        nested: bool,
    },
    Settle(Duration),
}

/// Finite, single-pass step sequence. Steps for a chunk are produced only
/// when the driver reaches it.
pub struct RevealSteps {
    chunks: std::vec::IntoIter<Chunk>,
    queued: VecDeque<RevealStep>,
    timings: RevealTimings,
}

impl RevealSteps {
    pub fn new(chunks: Vec<Chunk>, timings: RevealTimings) -> Self {
        Self {
            chunks: chunks.into_iter(),
            queued: VecDeque::new(),
            timings,
        }
    }

    fn expand(&mut self, chunk: Chunk) {
        let last_chunk = self.chunks.as_slice().is_empty();
        let pitch_if = |last: bool| if last { TonePitch::Final } else { TonePitch::Mid };

        self.queued.push_back(RevealStep::Attach {
            target: AttachTarget::Parent(chunk.parent),
            fragment: chunk.element,
            pitch: pitch_if(last_chunk && chunk.follow.is_empty()),
            nested: false,
        });
        if chunk.follow.is_empty() {
            self.queued
                .push_back(RevealStep::Settle(self.timings.chunk_settle));
            return;
        }

        self.queued
            .push_back(RevealStep::Settle(self.timings.follow_lead));
        let count = chunk.follow.len();
        for (index, item) in chunk.follow.into_iter().enumerate() {
            self.queued.push_back(RevealStep::Attach {
                target: AttachTarget::CurrentShell,
                fragment: item,
                pitch: pitch_if(last_chunk && index + 1 == count),
                nested: true,
            });
            self.queued
                .push_back(RevealStep::Settle(self.timings.item_settle));
        }
        self.queued
            .push_back(RevealStep::Settle(self.timings.follow_trail));
    }
}

impl Iterator for RevealSteps {
    type Item = RevealStep;

    fn next(&mut self) -> Option<RevealStep> {
        if self.queued.is_empty() {
            let chunk = self.chunks.next()?;
            self.expand(chunk);
        }
        self.queued.pop_front()
    }
}

/// Receives every observable reveal step.
pub trait RevealSink: Send + Sync {
    fn record(&self, event: RevealEvent);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevealError {
    #[error("reveal cancelled by a newer navigation")]
    Cancelled,
    #[error("follow item has no shell to attach to")]
    NoShell,
    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RevealReport {
    pub units: usize,
    pub tones: usize,
    pub skipped_tones: usize,
    pub finished_at: PresentationTime,
}

struct PendingFlash {
    seq: usize,
    node: NodeId,
    target: Option<PresentationTime>,
    /// Frequency to fire immediately at flash time when scheduling failed.
    fallback: Option<f32>,
}

/// Per-run bookkeeping of the driver.
#[derive(Default)]
struct FlashQueue {
    pending: VecDeque<PendingFlash>,
    /// Flashed on the previous frame; cleared on the next one.
    lit: Vec<NodeId>,
}

impl FlashQueue {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.lit.is_empty()
    }
}

pub struct Revealer<'a> {
    clock: &'a dyn RevealClock,
    audio: &'a SharedAudio,
    timings: &'a RevealTimings,
}

impl<'a> Revealer<'a> {
    pub fn new(clock: &'a dyn RevealClock, audio: &'a SharedAudio, timings: &'a RevealTimings) -> Self {
        Self {
            clock,
            audio,
            timings,
        }
    }

    /// Walks `steps` strictly in order. Returns `Cancelled` at the first
    /// suspension point after `cancel` fires; nothing is attached after that.
    pub async fn run(
        &self,
        live: &mut LiveDocument,
        steps: RevealSteps,
        sink: &dyn RevealSink,
        cancel: &CancellationToken,
    ) -> Result<RevealReport, RevealError> {
        let mut report = RevealReport::default();
        let mut flashes = FlashQueue::default();
        let mut shell: Option<NodeId> = None;

        for step in steps {
            if cancel.is_cancelled() {
                return Err(RevealError::Cancelled);
            }
            match step {
                RevealStep::Attach {
                    target,
                    fragment,
                    pitch,
                    nested,
                } => {
                    let parent = match target {
                        AttachTarget::Parent(id) => id,
                        AttachTarget::CurrentShell => shell.ok_or(RevealError::NoShell)?,
                    };
                    let node = live.append_fragment(parent, &fragment)?;
                    live.add_class(node, CHUNK_CLASS)?;
                    if !nested {
                        shell = Some(node);
                    }
                    let seq = report.units;
                    report.units += 1;
                    sink.record(RevealEvent::Attached {
                        seq,
                        nested,
                        at_ms: self.clock.now().as_millis(),
                        tag: fragment.tag().map(str::to_string),
                        text: fragment.text_content().trim().to_string(),
                    });
                    let pending = self.pair_tone(seq, node, pitch, sink, &mut report);
                    flashes.pending.push_back(pending);
                }
                RevealStep::Settle(delay) => {
                    self.settle(delay, live, &mut flashes, sink, cancel).await?;
                }
            }
        }

        while !flashes.is_idle() {
            let ts = self.frame(cancel).await?;
            self.service_frame(ts, live, &mut flashes, sink)?;
        }
        report.finished_at = self.clock.now();
        sink.record(RevealEvent::Completed {
            units: report.units,
            at_ms: report.finished_at.as_millis(),
        });
        reveal_debug!("reveal finished: {} units, {} tones", report.units, report.tones);
        Ok(report)
    }

    fn pair_tone(
        &self,
        seq: usize,
        node: NodeId,
        pitch: TonePitch,
        sink: &dyn RevealSink,
        report: &mut RevealReport,
    ) -> PendingFlash {
        let (frequency, result) = {
            let mut engine = lock(self.audio);
            let frequency = engine.settings().tone.frequency(pitch);
            (frequency, engine.schedule_tone(frequency, self.timings.tone_lead))
        };
        match result {
            Ok(tone) => {
                report.tones += 1;
                sink.record(RevealEvent::ToneScheduled {
                    seq,
                    frequency,
                    audio_time_s: tone.audio_time.as_secs(),
                    target_ms: tone.presentation_time.as_millis(),
                });
                PendingFlash {
                    seq,
                    node,
                    target: Some(tone.presentation_time),
                    fallback: None,
                }
            }
            Err(reason) => {
                report.skipped_tones += 1;
                sink.record(RevealEvent::skipped(seq, reason));
                PendingFlash {
                    seq,
                    node,
                    target: None,
                    fallback: (reason != ToneRejected::Disabled).then_some(frequency),
                }
            }
        }
    }

    /// Waits `delay`, servicing flashes on every frame that falls inside it.
    async fn settle(
        &self,
        delay: Duration,
        live: &mut LiveDocument,
        flashes: &mut FlashQueue,
        sink: &dyn RevealSink,
        cancel: &CancellationToken,
    ) -> Result<(), RevealError> {
        let deadline = self.clock.now() + delay;
        while !flashes.is_idle() && self.clock.next_frame_time() <= deadline {
            let ts = self.frame(cancel).await?;
            self.service_frame(ts, live, flashes, sink)?;
        }
        let remaining = deadline.saturating_since(self.clock.now());
        if !remaining.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RevealError::Cancelled),
                _ = self.clock.sleep(remaining) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(RevealError::Cancelled);
        }
        Ok(())
    }

    async fn frame(&self, cancel: &CancellationToken) -> Result<PresentationTime, RevealError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RevealError::Cancelled),
            ts = self.clock.next_frame() => Ok(ts),
        }
    }

    fn service_frame(
        &self,
        ts: PresentationTime,
        live: &mut LiveDocument,
        flashes: &mut FlashQueue,
        sink: &dyn RevealSink,
    ) -> Result<(), RevealError> {
        for node in flashes.lit.drain(..) {
            live.remove_class(node, FLASH_CLASS)?;
        }

        let tolerance = self.timings.frame_tolerance;
        while let Some(front) = flashes.pending.front() {
            let due = front.target.map_or(true, |target| ts >= target - tolerance);
            if !due {
                break;
            }
            let Some(flash) = flashes.pending.pop_front() else {
                break;
            };
            live.add_class(flash.node, SHOWN_CLASS)?;
            live.add_class(flash.node, FLASH_CLASS)?;
            flashes.lit.push(flash.node);
            sink.record(RevealEvent::Flashed {
                seq: flash.seq,
                at_ms: ts.as_millis(),
                target_ms: flash.target.map(PresentationTime::as_millis),
            });
            if let Some(frequency) = flash.fallback {
                self.immediate_tone(flash.seq, frequency, sink);
            }
        }
        Ok(())
    }

    fn immediate_tone(&self, seq: usize, frequency: f32, sink: &dyn RevealSink) {
        let result = lock(self.audio).tone_immediate(frequency);
        match result {
            Ok(tone) => sink.record(RevealEvent::ToneScheduled {
                seq,
                frequency,
                audio_time_s: tone.audio_time.as_secs(),
                target_ms: tone.presentation_time.as_millis(),
            }),
            Err(reason) => reveal_trace!("immediate tone for unit {seq} not played: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::audio::{
        AudioEngine, AudioSettings, MemoryPreferenceStore, OfflineHost, OfflineOptions,
        OfflineRecorder,
    };
    use crate::clock::{PresentationClock, VirtualClock};
    use crate::decompose::{prepare_destination, Decomposer};
    use crate::document::ReplacementDocument;
    use pretty_assertions::assert_eq;

    const PAGE: &str = "<main><ul><li>one</li><li>two</li><li>three</li></ul><p>after</p></main>";

    #[derive(Default)]
    struct Transcript {
        events: Mutex<Vec<RevealEvent>>,
        cancel_after_attach: Option<(usize, CancellationToken)>,
    }

    impl Transcript {
        fn events(&self) -> Vec<RevealEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RevealSink for Transcript {
        fn record(&self, event: RevealEvent) {
            if let (RevealEvent::Attached { seq, .. }, Some((at, token))) =
                (&event, &self.cancel_after_attach)
            {
                if seq == at {
                    token.cancel();
                }
            }
            self.events.lock().unwrap().push(event);
        }
    }

    struct Rig {
        clock: VirtualClock,
        audio: SharedAudio,
        recorder: OfflineRecorder,
        live: LiveDocument,
        steps: RevealSteps,
    }

    fn rig(html: &str, sound: bool, timings: &RevealTimings) -> Rig {
        let clock = VirtualClock::new();
        let host = OfflineHost::new(Arc::new(clock.clone()), OfflineOptions::default());
        let recorder = host.recorder();
        let audio = AudioEngine::new(
            Arc::new(host),
            Arc::new(clock.clone()),
            Arc::new(MemoryPreferenceStore::new(Some(sound))),
            AudioSettings::default(),
        )
        .shared();
        let mut live = LiveDocument::default();
        let doc = ReplacementDocument::parse(html).unwrap();
        let dest = prepare_destination(&mut live, doc.is_wrapped()).unwrap();
        let chunks = Decomposer::default().decompose(&doc, &dest);
        Rig {
            clock,
            audio,
            recorder,
            live,
            steps: RevealSteps::new(chunks, timings.clone()),
        }
    }

    fn attached(events: &[RevealEvent]) -> Vec<(usize, bool, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                RevealEvent::Attached {
                    seq, nested, text, ..
                } => Some((*seq, *nested, text.clone())),
                _ => None,
            })
            .collect()
    }

    fn flashed(events: &[RevealEvent]) -> Vec<(usize, f64, Option<f64>)> {
        events
            .iter()
            .filter_map(|e| match e {
                RevealEvent::Flashed {
                    seq,
                    at_ms,
                    target_ms,
                } => Some((*seq, *at_ms, *target_ms)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn steps_interleave_settles_and_pick_the_final_pitch() {
        let timings = RevealTimings::default();
        let r = rig(PAGE, true, &timings);
        let summary = r
            .steps
            .map(|step| match step {
                RevealStep::Attach { pitch, nested, .. } => format!("attach:{nested}:{pitch:?}"),
                RevealStep::Settle(d) => format!("settle:{}", d.as_millis()),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                "attach:false:Mid",
                "settle:60",
                "attach:true:Mid",
                "settle:50",
                "attach:true:Mid",
                "settle:50",
                "attach:true:Mid",
                "settle:50",
                "settle:60",
                "attach:false:Final",
                "settle:70",
            ]
        );
    }

    #[test]
    fn last_follow_item_of_last_chunk_gets_final_pitch() {
        let r = rig("<main><p>a</p><ol><li>x</li><li>y</li></ol></main>", true, &RevealTimings::default());
        let pitches = r
            .steps
            .filter_map(|step| match step {
                RevealStep::Attach { pitch, .. } => Some(pitch),
                RevealStep::Settle(_) => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            pitches,
            vec![TonePitch::Mid, TonePitch::Mid, TonePitch::Mid, TonePitch::Final]
        );
    }

    #[tokio::test]
    async fn reveal_attaches_in_order_and_flashes_on_the_tone() {
        let timings = RevealTimings::default();
        let mut r = rig(PAGE, true, &timings);
        let sink = Transcript::default();
        let cancel = CancellationToken::new();
        let revealer = Revealer::new(&r.clock, &r.audio, &timings);

        let report = revealer
            .run(&mut r.live, r.steps, &sink, &cancel)
            .await
            .unwrap();
        assert_eq!(report.units, 5);
        assert_eq!(report.tones, 5);

        let events = sink.events();
        assert_eq!(
            attached(&events),
            vec![
                (0, false, String::new()),
                (1, true, "one".to_string()),
                (2, true, "two".to_string()),
                (3, true, "three".to_string()),
                (4, false, "after".to_string()),
            ]
        );

        let frame_ms = 1000.0 / 60.0;
        let flashes = flashed(&events);
        assert_eq!(flashes.iter().map(|f| f.0).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        for (_, at, target) in &flashes {
            let target = target.unwrap();
            assert!(*at >= target - 1.0, "flash at {at} before tone at {target}");
            assert!(*at < target + frame_ms, "flash at {at} late for tone at {target}");
        }

        let voices = r.recorder.voices();
        assert_eq!(voices.len(), 5);
        assert!(voices[..4].iter().all(|v| v.frequency == 783.99));
        assert_eq!(voices[4].frequency, 391.995);

        let main = r.live.content_container().unwrap();
        let shown = r.live.select_class(SHOWN_CLASS);
        assert_eq!(shown.len(), 5);
        assert!(r.live.select_class(FLASH_CLASS).is_empty());
        assert_eq!(
            r.live.to_fragment(main).unwrap().to_html(),
            "<main><ul class=\"pjax-chunk pjax-on\"><li class=\"pjax-chunk pjax-on\">one</li>\
             <li class=\"pjax-chunk pjax-on\">two</li><li class=\"pjax-chunk pjax-on\">three</li></ul>\
             <p class=\"pjax-chunk pjax-on\">after</p></main>"
        );
        assert!(matches!(events.last(), Some(RevealEvent::Completed { units: 5, .. })));
    }

    #[tokio::test]
    async fn disabled_sound_still_reveals_everything() {
        let timings = RevealTimings::default();
        let mut r = rig(PAGE, false, &timings);
        let sink = Transcript::default();
        let revealer = Revealer::new(&r.clock, &r.audio, &timings);

        let report = revealer
            .run(&mut r.live, r.steps, &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.units, 5);
        assert_eq!(report.tones, 0);
        assert!(r.recorder.voices().is_empty());

        let events = sink.events();
        assert_eq!(attached(&events).len(), 5);
        let flashes = flashed(&events);
        assert_eq!(flashes.len(), 5);
        assert!(flashes.iter().all(|(_, _, target)| target.is_none()));
    }

    #[tokio::test]
    async fn rate_limited_tones_never_withhold_flashes() {
        let timings = RevealTimings {
            chunk_settle: Duration::from_millis(10),
            ..RevealTimings::default()
        };
        let mut r = rig("<main><p>1</p><p>2</p><p>3</p><p>4</p></main>", true, &timings);
        let sink = Transcript::default();
        let revealer = Revealer::new(&r.clock, &r.audio, &timings);

        let report = revealer
            .run(&mut r.live, r.steps, &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.units, 4);
        assert!(report.skipped_tones > 0);

        let events = sink.events();
        assert_eq!(flashed(&events).len(), 4);
        let skipped = events
            .iter()
            .filter(|e| matches!(e, RevealEvent::ToneSkipped { reason, .. } if reason == "rate limited"))
            .count();
        assert_eq!(skipped, report.skipped_tones);

        // The first tone, plus one immediate fallback once the limit lapsed.
        assert_eq!(r.recorder.voices().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_attach() {
        let timings = RevealTimings::default();
        let mut r = rig(PAGE, true, &timings);
        let cancel = CancellationToken::new();
        let sink = Transcript {
            cancel_after_attach: Some((1, cancel.clone())),
            ..Transcript::default()
        };
        let revealer = Revealer::new(&r.clock, &r.audio, &timings);

        let err = revealer
            .run(&mut r.live, r.steps, &sink, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, RevealError::Cancelled);
        assert_eq!(attached(&sink.events()).len(), 2);
        assert_eq!(r.live.select_class(CHUNK_CLASS).len(), 2);
        assert!(r.clock.now() < PresentationTime(100.0));
    }
}
