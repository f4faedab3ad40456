//! One-shot tone voices: triangle oscillator, low-pass, attack/decay envelope.

use std::time::Duration;

use super::dsp::Biquad;
use super::settings::ToneSettings;
use crate::clock::AudioTime;

/// A tone as handed to the device: everything needed to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneVoice {
    pub frequency: f32,
    pub start: AudioTime,
    pub length: Duration,
    pub attack: Duration,
    pub decay_end: Duration,
    pub peak_gain: f32,
    pub floor_gain: f32,
    pub lowpass_hz: f32,
    pub lowpass_q: f32,
    pub dry_gain: f32,
    pub send_gain: f32,
}

impl ToneVoice {
    pub fn new(frequency: f32, start: AudioTime, length: Duration, settings: &ToneSettings) -> Self {
        Self {
            frequency,
            start,
            length,
            attack: settings.attack,
            decay_end: settings.decay_end,
            peak_gain: settings.peak_gain,
            floor_gain: settings.floor_gain,
            lowpass_hz: settings.lowpass_hz,
            lowpass_q: settings.lowpass_q,
            dry_gain: settings.dry_gain,
            send_gain: settings.send_gain,
        }
    }

    pub fn stop(&self) -> AudioTime {
        self.start + self.length
    }

    /// Envelope gain `elapsed` after the voice starts.
    pub fn envelope(&self, elapsed: Duration) -> f32 {
        let t = elapsed.as_secs_f32();
        let attack = self.attack.as_secs_f32();
        if t < attack {
            return self.peak_gain * t / attack;
        }
        let decay = (self.decay_end.as_secs_f32() - attack).max(f32::EPSILON);
        let progress = ((t - attack) / decay).min(1.0);
        let peak = self.peak_gain.max(1e-6);
        peak * (self.floor_gain.max(1e-6) / peak).powf(progress)
    }
}

/// Dry and send contributions of one voice for one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoiceOutput {
    pub dry: f32,
    pub send: f32,
}

/// Rendering state for a [`ToneVoice`].
#[derive(Debug, Clone)]
pub struct VoiceRenderer {
    voice: ToneVoice,
    sample_rate: u32,
    start_sample: u64,
    stop_sample: u64,
    filter: Biquad,
}

impl VoiceRenderer {
    pub fn new(voice: ToneVoice, sample_rate: u32) -> Self {
        Self {
            start_sample: voice.start.to_sample(sample_rate),
            stop_sample: voice.stop().to_sample(sample_rate),
            filter: Biquad::lowpass(sample_rate, voice.lowpass_hz, voice.lowpass_q),
            voice,
            sample_rate,
        }
    }

    pub fn is_finished(&self, sample: u64) -> bool {
        sample >= self.stop_sample
    }

    /// Output at absolute sample index `sample`. Silent before the start.
    pub fn render(&mut self, sample: u64) -> VoiceOutput {
        if sample < self.start_sample || sample >= self.stop_sample {
            return VoiceOutput::default();
        }
        let offset = sample - self.start_sample;
        let t = offset as f64 / f64::from(self.sample_rate);
        let phase = (t * f64::from(self.voice.frequency)).fract() as f32;
        let triangle = 1.0 - 4.0 * (phase - 0.5).abs();
        let filtered = self.filter.process(triangle);
        let shaped = filtered * self.voice.envelope(Duration::from_secs_f64(t));
        VoiceOutput {
            dry: shaped * self.voice.dry_gain,
            send: shaped * self.voice.send_gain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice() -> ToneVoice {
        ToneVoice::new(
            783.99,
            AudioTime(0.1),
            Duration::from_millis(45),
            &ToneSettings::default(),
        )
    }

    #[test]
    fn envelope_rises_then_decays_to_floor() {
        let v = voice();
        assert_eq!(v.envelope(Duration::ZERO), 0.0);
        assert!((v.envelope(Duration::from_millis(1)) - 0.5).abs() < 1e-3);
        assert!((v.envelope(Duration::from_millis(2)) - 1.0).abs() < 1e-3);
        assert!((v.envelope(Duration::from_millis(35)) - 0.2).abs() < 1e-3);
        assert!((v.envelope(Duration::from_millis(44)) - 0.2).abs() < 1e-3);
        assert!(v.envelope(Duration::from_millis(10)) < v.envelope(Duration::from_millis(5)));
    }

    #[test]
    fn renderer_is_silent_outside_its_window() {
        let mut r = VoiceRenderer::new(voice(), 48_000);
        assert_eq!(r.render(0), VoiceOutput::default());
        assert_eq!(r.render(4_799), VoiceOutput::default());
        let audible = (4_800..4_800 + 2_160)
            .map(|n| r.render(n).dry.abs())
            .fold(0.0f32, f32::max);
        assert!(audible > 0.1);
        assert!(r.is_finished(4_800 + 2_160));
        assert_eq!(r.render(4_800 + 2_160), VoiceOutput::default());
    }
}
