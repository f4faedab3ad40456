use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dsp::Biquad;
use super::settings::GraphSettings;

/// Continuous fan-like noise bed: seeded white noise through a low-pass.
pub struct Ambience {
    rng: StdRng,
    filter: Biquad,
    gain: f32,
    playing: bool,
}

impl Ambience {
    pub fn new(settings: &GraphSettings) -> Self {
        Self {
            // Separate stream from the impulse response noise.
            rng: StdRng::seed_from_u64(settings.noise_seed.wrapping_add(1)),
            filter: Biquad::lowpass(settings.sample_rate, settings.ambience_cutoff_hz, 0.707),
            gain: settings.ambience_gain,
            playing: false,
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn next_sample(&mut self) -> f32 {
        if !self.playing {
            return 0.0;
        }
        let white = self.rng.random_range(-1.0f32..1.0);
        self.filter.process(white) * self.gain
    }
}
