use std::f32::consts::PI;
use std::time::Duration;

use super::settings::CompressorSettings;

/// Second-order low-pass section (RBJ cookbook coefficients, direct form I).
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn lowpass(sample_rate: u32, cutoff_hz: f32, q: f32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let cutoff = cutoff_hz.clamp(1.0, nyquist * 0.99);
        let w0 = 2.0 * PI * cutoff / sample_rate as f32;
        let alpha = w0.sin() / (2.0 * q.max(1e-3));
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Feed-forward peak compressor with a soft knee.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current gain change in dB, never positive.
    gain_db: f32,
}

impl Compressor {
    pub fn new(settings: &CompressorSettings, sample_rate: u32) -> Self {
        Self {
            threshold_db: settings.threshold_db,
            knee_db: settings.knee_db.max(0.0),
            ratio: settings.ratio.max(1.0),
            attack_coeff: smoothing(settings.attack, sample_rate),
            release_coeff: smoothing(settings.release, sample_rate),
            gain_db: 0.0,
        }
    }

    /// Static gain change for an input level, in dB.
    pub fn gain_for(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        if self.knee_db > 0.0 && over.abs() * 2.0 <= self.knee_db {
            slope * (over + self.knee_db / 2.0).powi(2) / (2.0 * self.knee_db)
        } else if over > 0.0 {
            slope * over
        } else {
            0.0
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let level_db = 20.0 * x.abs().max(1e-9).log10();
        let target = self.gain_for(level_db);
        let coeff = if target < self.gain_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.gain_db = target + coeff * (self.gain_db - target);
        x * 10f32.powf(self.gain_db / 20.0)
    }
}

fn smoothing(time: Duration, sample_rate: u32) -> f32 {
    let samples = time.as_secs_f32() * sample_rate as f32;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_passes_dc_and_cuts_highs() {
        let mut dc = Biquad::lowpass(44_100, 1200.0, 0.6);
        let settled = (0..4000).map(|_| dc.process(1.0)).last().unwrap();
        assert!((settled - 1.0).abs() < 1e-3);

        let mut hf = Biquad::lowpass(44_100, 1200.0, 0.6);
        let peak = (0..4000)
            .map(|n| hf.process(if n % 2 == 0 { 1.0 } else { -1.0 }))
            .skip(2000)
            .fold(0.0f32, |acc, y| acc.max(y.abs()));
        assert!(peak < 0.01);
    }

    #[test]
    fn quiet_signals_pass_through_the_compressor() {
        let mut comp = Compressor::new(&CompressorSettings::default(), 44_100);
        let y = (0..100).map(|_| comp.process(0.001)).last().unwrap();
        assert!((y - 0.001).abs() < 1e-6);
    }

    #[test]
    fn loud_signals_are_reduced() {
        let settings = CompressorSettings::default();
        let comp = Compressor::new(&settings, 44_100);
        // 20 dB over threshold is past the knee: (1/8 - 1) * 20.
        assert!((comp.gain_for(-18.0 + 20.0) + 17.5).abs() < 1e-4);
        assert_eq!(comp.gain_for(-60.0), 0.0);

        let mut running = Compressor::new(&settings, 44_100);
        let y = (0..44_100).map(|_| running.process(1.0)).last().unwrap();
        assert!(y < 0.2);
    }
}
