//! The audio output device contract and its offline implementation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::graph::MixGraph;
use super::voice::ToneVoice;
use crate::clock::{AudioTime, PresentationClock, PresentationTime};
use crate::lock;

/// Samples per processing quantum; the device clock advances in these steps.
pub const RENDER_QUANTUM: u64 = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("audio output needs a user gesture before it can start")]
    GestureRequired,
    #[error("audio device error: {0}")]
    Device(String),
}

/// A paired reading of both clocks, taken by the device itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputTimestamp {
    /// Audio time of the sample leaving the output right now.
    pub context_time: AudioTime,
    /// Presentation time at which `context_time` was sampled.
    pub performance_time: PresentationTime,
}

pub trait AudioDevice: Send {
    fn sample_rate(&self) -> u32;

    /// The device clock: time of the next quantum to be processed.
    fn current_time(&self) -> AudioTime;

    /// `None` when the device cannot report its output timing.
    fn output_timestamp(&self) -> Option<OutputTimestamp>;

    fn is_suspended(&self) -> bool;

    fn resume(&mut self) -> Result<(), AudioError>;

    /// Records that the user interacted with the page.
    fn grant_user_activation(&mut self);

    fn start_voice(&mut self, voice: ToneVoice);

    fn set_ambience(&mut self, playing: bool);
}

/// Opens devices. Opening can fail, for instance before any user gesture.
pub trait AudioHost: Send + Sync {
    fn open(&self, graph: MixGraph) -> Result<Box<dyn AudioDevice>, AudioError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfflineOptions {
    /// The device starts suspended and refuses to resume without activation.
    pub requires_gesture: bool,
    /// Output latency reported through [`AudioDevice::output_timestamp`];
    /// `None` disables the timestamp facility.
    pub output_latency: Option<Duration>,
    /// Make every `open` fail.
    pub unavailable: bool,
}

impl Default for OfflineOptions {
    fn default() -> Self {
        Self {
            requires_gesture: false,
            output_latency: Some(Duration::from_millis(10)),
            unavailable: false,
        }
    }
}

struct OfflineCore {
    graph: Option<MixGraph>,
    voices: Vec<ToneVoice>,
    /// Audio time accumulated up to the last suspend.
    base: f64,
    /// Presentation time of the last resume; `None` while suspended.
    running_since: Option<PresentationTime>,
    activated: bool,
    opened: usize,
}

/// Audio host backed by the presentation clock: audio time runs at the same
/// rate as presentation time while the device is running.
#[derive(Clone)]
pub struct OfflineHost {
    core: Arc<Mutex<OfflineCore>>,
    clock: Arc<dyn PresentationClock>,
    options: OfflineOptions,
}

impl OfflineHost {
    pub fn new(clock: Arc<dyn PresentationClock>, options: OfflineOptions) -> Self {
        Self {
            core: Arc::new(Mutex::new(OfflineCore {
                graph: None,
                voices: Vec::new(),
                base: 0.0,
                running_since: None,
                activated: false,
                opened: 0,
            })),
            clock,
            options,
        }
    }

    /// Read access to everything the devices of this host have done.
    pub fn recorder(&self) -> OfflineRecorder {
        OfflineRecorder {
            core: self.core.clone(),
        }
    }
}

impl AudioHost for OfflineHost {
    fn open(&self, graph: MixGraph) -> Result<Box<dyn AudioDevice>, AudioError> {
        if self.options.unavailable {
            return Err(AudioError::Unavailable("offline host disabled".to_string()));
        }
        let mut core = lock(&self.core);
        core.opened += 1;
        core.graph = Some(graph);
        core.base = 0.0;
        core.running_since = if self.options.requires_gesture && !core.activated {
            None
        } else {
            Some(self.clock.now())
        };
        Ok(Box::new(OfflineDevice {
            core: self.core.clone(),
            clock: self.clock.clone(),
            options: self.options.clone(),
        }))
    }
}

pub struct OfflineDevice {
    core: Arc<Mutex<OfflineCore>>,
    clock: Arc<dyn PresentationClock>,
    options: OfflineOptions,
}

impl OfflineDevice {
    fn raw_time(&self, core: &OfflineCore) -> f64 {
        match core.running_since {
            Some(since) => core.base + (self.clock.now().as_millis() - since.as_millis()).max(0.0) / 1000.0,
            None => core.base,
        }
    }

    fn sample_rate_of(core: &OfflineCore) -> u32 {
        core.graph
            .as_ref()
            .map_or(44_100, MixGraph::sample_rate)
    }
}

impl AudioDevice for OfflineDevice {
    fn sample_rate(&self) -> u32 {
        Self::sample_rate_of(&lock(&self.core))
    }

    fn current_time(&self) -> AudioTime {
        let core = lock(&self.core);
        let rate = f64::from(Self::sample_rate_of(&core));
        let samples = (self.raw_time(&core) * rate).floor() as u64;
        let quantized = samples / RENDER_QUANTUM * RENDER_QUANTUM;
        AudioTime(quantized as f64 / rate)
    }

    fn output_timestamp(&self) -> Option<OutputTimestamp> {
        let latency = self.options.output_latency?;
        let core = lock(&self.core);
        core.running_since?;
        let context = (self.raw_time(&core) - latency.as_secs_f64()).max(0.0);
        Some(OutputTimestamp {
            context_time: AudioTime(context),
            performance_time: self.clock.now(),
        })
    }

    fn is_suspended(&self) -> bool {
        lock(&self.core).running_since.is_none()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut core = lock(&self.core);
        if core.running_since.is_some() {
            return Ok(());
        }
        if self.options.requires_gesture && !core.activated {
            return Err(AudioError::GestureRequired);
        }
        core.running_since = Some(self.clock.now());
        Ok(())
    }

    fn grant_user_activation(&mut self) {
        lock(&self.core).activated = true;
    }

    fn start_voice(&mut self, voice: ToneVoice) {
        let mut core = lock(&self.core);
        core.voices.push(voice.clone());
        if let Some(graph) = core.graph.as_mut() {
            graph.add_voice(voice);
        }
    }

    fn set_ambience(&mut self, playing: bool) {
        if let Some(graph) = lock(&self.core).graph.as_mut() {
            graph.set_ambience(playing);
        }
    }
}

/// Inspection and rendering handle for an [`OfflineHost`].
#[derive(Clone)]
pub struct OfflineRecorder {
    core: Arc<Mutex<OfflineCore>>,
}

impl OfflineRecorder {
    /// Every voice started so far, in start-call order.
    pub fn voices(&self) -> Vec<ToneVoice> {
        lock(&self.core).voices.clone()
    }

    /// How many times a device was opened.
    pub fn opened(&self) -> usize {
        lock(&self.core).opened
    }

    pub fn sample_rate(&self) -> Option<u32> {
        lock(&self.core).graph.as_ref().map(MixGraph::sample_rate)
    }

    pub fn ambience_playing(&self) -> bool {
        lock(&self.core)
            .graph
            .as_ref()
            .is_some_and(MixGraph::ambience_playing)
    }

    /// Renders the graph from where it stopped up to `until`.
    pub fn render_until(&self, until: AudioTime) -> Vec<f32> {
        let mut core = lock(&self.core);
        let Some(graph) = core.graph.as_mut() else {
            return Vec::new();
        };
        let end = until.to_sample(graph.sample_rate());
        let len = end.saturating_sub(graph.position()) as usize;
        let mut out = vec![0.0; len];
        graph.render(&mut out);
        out
    }

    /// Renders past the end of the last voice plus `tail`.
    pub fn render_session(&self, tail: Duration) -> Vec<f32> {
        let end = self
            .voices()
            .iter()
            .map(ToneVoice::stop)
            .fold(AudioTime(0.0), |a, b| if b > a { b } else { a });
        self.render_until(end + tail)
    }
}
