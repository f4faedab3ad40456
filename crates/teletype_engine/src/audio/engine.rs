use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use teletype_logging::{reveal_debug, reveal_trace, reveal_warn};

use super::device::{AudioDevice, AudioHost};
use super::graph::MixGraph;
use super::preference::PreferenceStore;
use super::settings::AudioSettings;
use super::sync::{ClockSynchronizer, SyncPath};
use super::voice::ToneVoice;
use crate::clock::{AudioTime, PresentationClock, PresentationTime};

/// The engine shared between the reveal driver and the controller side.
/// The lock is never held across an await point.
pub type SharedAudio = Arc<Mutex<AudioEngine>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioLifecycle {
    /// No device has been opened yet.
    Uninitialized,
    Ready,
    Suspended,
}

/// Why a tone request produced no sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneRejected {
    Disabled,
    Unavailable,
    RateLimited,
}

impl fmt::Display for ToneRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneRejected::Disabled => write!(f, "sound disabled"),
            ToneRejected::Unavailable => write!(f, "audio unavailable"),
            ToneRejected::RateLimited => write!(f, "rate limited"),
        }
    }
}

/// A tone the device accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    pub frequency: f32,
    /// When the tone starts on the device clock.
    pub audio_time: AudioTime,
    /// The same instant on the presentation clock.
    pub presentation_time: PresentationTime,
    pub path: SyncPath,
}

pub struct AudioEngine {
    host: Arc<dyn AudioHost>,
    clock: Arc<dyn PresentationClock>,
    preference: Arc<dyn PreferenceStore>,
    settings: AudioSettings,
    device: Option<Box<dyn AudioDevice>>,
    enabled: bool,
    last_tone_at: Option<PresentationTime>,
    warned_unavailable: bool,
}

impl AudioEngine {
    /// Reads the stored preference (enabled when unset) and, when enabled,
    /// opens the device right away. Failing to open is not an error here.
    pub fn new(
        host: Arc<dyn AudioHost>,
        clock: Arc<dyn PresentationClock>,
        preference: Arc<dyn PreferenceStore>,
        settings: AudioSettings,
    ) -> Self {
        let enabled = preference.load().unwrap_or(true);
        let mut engine = Self {
            host,
            clock,
            preference,
            settings,
            device: None,
            enabled,
            last_tone_at: None,
            warned_unavailable: false,
        };
        if enabled {
            engine.ensure_device();
        }
        engine
    }

    pub fn shared(self) -> SharedAudio {
        Arc::new(Mutex::new(self))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn lifecycle(&self) -> AudioLifecycle {
        match &self.device {
            None => AudioLifecycle::Uninitialized,
            Some(device) if device.is_suspended() => AudioLifecycle::Suspended,
            Some(_) => AudioLifecycle::Ready,
        }
    }

    /// Turning sound on opens and resumes the device; turning it off only
    /// stops the ambience. Tones already scheduled play out.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.preference.save(enabled);
        reveal_debug!("sound {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            if self.ensure_running() {
                self.set_ambience(true);
            }
        } else {
            self.set_ambience(false);
        }
    }

    /// A user gesture unlocks devices that refuse to start without one.
    pub fn notify_user_gesture(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.grant_user_activation();
        }
        if !self.enabled {
            return;
        }
        if self.device.is_none() && self.ensure_device() {
            if let Some(device) = self.device.as_mut() {
                device.grant_user_activation();
            }
        }
        if self.ensure_running() {
            self.set_ambience(true);
        }
    }

    /// Schedules a tone `lead` from now on the device clock, never less than
    /// the configured minimum lead.
    pub fn schedule_tone(&mut self, frequency: f32, lead: Duration) -> Result<ScheduledTone, ToneRejected> {
        let lead = lead.max(self.settings.tone.min_lead);
        let length = self.settings.tone.scheduled_length;
        self.start_tone(frequency, lead, length)
    }

    /// Plays a tone at the current device time, with no look-ahead.
    pub fn tone_immediate(&mut self, frequency: f32) -> Result<ScheduledTone, ToneRejected> {
        let length = self.settings.tone.immediate_length;
        self.start_tone(frequency, Duration::ZERO, length)
    }

    fn start_tone(&mut self, frequency: f32, lead: Duration, length: Duration) -> Result<ScheduledTone, ToneRejected> {
        if !self.enabled {
            return Err(ToneRejected::Disabled);
        }
        if !self.ensure_running() {
            return Err(ToneRejected::Unavailable);
        }
        let now = self.clock.now();
        if let Some(last) = self.last_tone_at {
            if now.saturating_since(last) < self.settings.tone.rate_limit {
                reveal_trace!("tone {frequency} Hz dropped by rate limit");
                return Err(ToneRejected::RateLimited);
            }
        }
        let device = self.device.as_mut().ok_or(ToneRejected::Unavailable)?;

        let start = device.current_time() + lead;
        device.start_voice(ToneVoice::new(frequency, start, length, &self.settings.tone));
        self.last_tone_at = Some(now);

        let synced = ClockSynchronizer::to_presentation(device.as_ref(), start, now);
        reveal_trace!(
            "tone {frequency} Hz at audio {:.4}s, presentation {:.2}ms ({:?})",
            start.as_secs(),
            synced.presentation.as_millis(),
            synced.path
        );
        Ok(ScheduledTone {
            frequency,
            audio_time: start,
            presentation_time: synced.presentation,
            path: synced.path,
        })
    }

    /// Opens the device once. Returns whether a device exists.
    fn ensure_device(&mut self) -> bool {
        if self.device.is_some() {
            return true;
        }
        match self.host.open(MixGraph::new(self.settings.graph.clone())) {
            Ok(device) => {
                reveal_debug!("audio device opened at {} Hz", device.sample_rate());
                self.device = Some(device);
                true
            }
            Err(err) => {
                if !self.warned_unavailable {
                    reveal_warn!("audio disabled for this session: {err}");
                    self.warned_unavailable = true;
                }
                false
            }
        }
    }

    /// Opens and resumes the device. Returns whether it is running.
    fn ensure_running(&mut self) -> bool {
        if !self.ensure_device() {
            return false;
        }
        let Some(device) = self.device.as_mut() else {
            return false;
        };
        if device.is_suspended() {
            if let Err(err) = device.resume() {
                reveal_trace!("audio still suspended: {err}");
                return false;
            }
        }
        true
    }

    fn set_ambience(&mut self, playing: bool) {
        if let Some(device) = self.device.as_mut() {
            device.set_ambience(playing);
        }
    }
}
