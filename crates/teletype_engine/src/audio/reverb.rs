//! Ambience send: a synthetic impulse response applied by FFT overlap-add.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::settings::GraphSettings;

/// Decaying noise burst, normalized to unit energy so the return gain alone
/// sets the wet level.
pub fn impulse_response(settings: &GraphSettings) -> Vec<f32> {
    let len = (settings.reverb_length.as_secs_f64() * f64::from(settings.sample_rate)).round() as usize;
    let len = len.max(1);
    let mut rng = StdRng::seed_from_u64(settings.noise_seed);
    let mut ir = (0..len)
        .map(|i| {
            let t = i as f32 / len as f32;
            rng.random_range(-1.0f32..1.0) * (1.0 - t).powf(settings.reverb_decay_power)
        })
        .collect::<Vec<_>>();
    let energy = ir.iter().map(|s| s * s).sum::<f32>().sqrt();
    if energy > 0.0 {
        ir.iter_mut().for_each(|s| *s /= energy);
    }
    ir
}

/// Block convolver. Each call consumes up to `block_size` input samples and
/// produces the same number of output samples; the tail carries over.
pub struct Convolver {
    block_size: usize,
    fft_len: usize,
    ir_spectrum: Vec<Complex<f32>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    tail: Vec<f32>,
}

impl Convolver {
    pub fn new(ir: &[f32], block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let fft_len = (block_size + ir.len().max(1) - 1).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let mut ir_spectrum = vec![Complex::new(0.0, 0.0); fft_len];
        for (slot, &s) in ir_spectrum.iter_mut().zip(ir) {
            *slot = Complex::new(s, 0.0);
        }
        forward.process(&mut ir_spectrum);

        Self {
            block_size,
            fft_len,
            ir_spectrum,
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); fft_len],
            tail: vec![0.0; fft_len],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert!(input.len() <= self.block_size);
        debug_assert_eq!(input.len(), output.len());
        let n = input.len();

        let silent = input.iter().all(|s| *s == 0.0);
        if !silent {
            self.scratch.fill(Complex::new(0.0, 0.0));
            for (slot, &s) in self.scratch.iter_mut().zip(input) {
                *slot = Complex::new(s, 0.0);
            }
            self.forward.process(&mut self.scratch);
            for (bin, h) in self.scratch.iter_mut().zip(&self.ir_spectrum) {
                *bin = *bin * *h;
            }
            self.inverse.process(&mut self.scratch);
            let scale = 1.0 / self.fft_len as f32;
            for (acc, bin) in self.tail.iter_mut().zip(&self.scratch) {
                *acc += bin.re * scale;
            }
        }

        output.copy_from_slice(&self.tail[..n]);
        self.tail.copy_within(n.., 0);
        let len = self.tail.len();
        self.tail[len - n..].fill(0.0);
    }
}
