//! The mix graph every sound passes through.
//!
//! ```text
//! voice ─┬─ dry ──────────────────────┐
//!        └─ send ─ convolver ─ return ─┴─ sfx bus ─┐
//!                           ambience ─────────────┴─ master ─ compressor ─ out
//! ```

use super::ambience::Ambience;
use super::dsp::Compressor;
use super::reverb::{impulse_response, Convolver};
use super::settings::GraphSettings;
use super::voice::{ToneVoice, VoiceRenderer};

pub struct MixGraph {
    settings: GraphSettings,
    voices: Vec<VoiceRenderer>,
    convolver: Convolver,
    ambience: Ambience,
    compressor: Compressor,
    /// Index of the next sample `render` produces.
    position: u64,
    dry: Vec<f32>,
    send: Vec<f32>,
    wet: Vec<f32>,
}

impl MixGraph {
    pub fn new(settings: GraphSettings) -> Self {
        let block = settings.block_size.max(1);
        Self {
            voices: Vec::new(),
            convolver: Convolver::new(&impulse_response(&settings), block),
            ambience: Ambience::new(&settings),
            compressor: Compressor::new(&settings.compressor, settings.sample_rate),
            position: 0,
            dry: vec![0.0; block],
            send: vec![0.0; block],
            wet: vec![0.0; block],
            settings,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn add_voice(&mut self, voice: ToneVoice) {
        self.voices
            .push(VoiceRenderer::new(voice, self.settings.sample_rate));
    }

    pub fn set_ambience(&mut self, playing: bool) {
        self.ambience.set_playing(playing);
    }

    pub fn ambience_playing(&self) -> bool {
        self.ambience.is_playing()
    }

    /// Renders the next `out.len()` samples.
    pub fn render(&mut self, out: &mut [f32]) {
        let block = self.convolver.block_size();
        for chunk in out.chunks_mut(block) {
            self.render_block(chunk);
        }
    }

    fn render_block(&mut self, out: &mut [f32]) {
        let n = out.len();
        for i in 0..n {
            let sample = self.position + i as u64;
            let (mut dry, mut send) = (0.0, 0.0);
            for voice in &mut self.voices {
                let v = voice.render(sample);
                dry += v.dry;
                send += v.send;
            }
            self.dry[i] = dry;
            self.send[i] = send;
        }
        self.convolver.process(&self.send[..n], &mut self.wet[..n]);

        let s = &self.settings;
        for (i, slot) in out.iter_mut().enumerate() {
            let sfx = s.sfx_gain * (self.dry[i] + s.reverb_return * self.wet[i]);
            let mixed = s.master_gain * (sfx + self.ambience.next_sample());
            *slot = self.compressor.process(mixed);
        }

        self.position += n as u64;
        let position = self.position;
        self.voices.retain(|v| !v.is_finished(position));
    }
}
