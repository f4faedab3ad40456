use std::time::Duration;

/// Which of the two reveal tones to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TonePitch {
    /// Every unit except the last one.
    Mid,
    /// The last unit of a reveal; the pitch drop marks completion.
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToneSettings {
    /// Lead times shorter than this are raised to it.
    pub min_lead: Duration,
    /// Requests closer together than this are dropped.
    pub rate_limit: Duration,
    pub mid_frequency: f32,
    pub final_frequency: f32,
    pub scheduled_length: Duration,
    pub immediate_length: Duration,
    pub attack: Duration,
    /// Time from voice start at which the envelope reaches `floor_gain`.
    pub decay_end: Duration,
    pub peak_gain: f32,
    pub floor_gain: f32,
    pub lowpass_hz: f32,
    pub lowpass_q: f32,
    pub dry_gain: f32,
    pub send_gain: f32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            min_lead: Duration::from_millis(30),
            rate_limit: Duration::from_millis(35),
            mid_frequency: 783.99,
            final_frequency: 391.995,
            scheduled_length: Duration::from_millis(45),
            immediate_length: Duration::from_millis(55),
            attack: Duration::from_millis(2),
            decay_end: Duration::from_millis(35),
            peak_gain: 1.0,
            floor_gain: 0.2,
            lowpass_hz: 1200.0,
            lowpass_q: 0.6,
            dry_gain: 1.0,
            send_gain: 0.01,
        }
    }
}

impl ToneSettings {
    pub fn frequency(&self, pitch: TonePitch) -> f32 {
        match pitch {
            TonePitch::Mid => self.mid_frequency,
            TonePitch::Final => self.final_frequency,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack: Duration,
    pub release: Duration,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            knee_db: 20.0,
            ratio: 8.0,
            attack: Duration::from_millis(3),
            release: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphSettings {
    pub sample_rate: u32,
    pub master_gain: f32,
    /// Hard cap on everything tone-related.
    pub sfx_gain: f32,
    pub reverb_length: Duration,
    pub reverb_decay_power: f32,
    pub reverb_return: f32,
    pub ambience_gain: f32,
    pub ambience_cutoff_hz: f32,
    pub compressor: CompressorSettings,
    pub noise_seed: u64,
    /// Samples per convolution block.
    pub block_size: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            master_gain: 1.0,
            sfx_gain: 0.01,
            reverb_length: Duration::from_millis(400),
            reverb_decay_power: 1.8,
            reverb_return: 0.04,
            ambience_gain: 0.06,
            ambience_cutoff_hz: 320.0,
            compressor: CompressorSettings::default(),
            noise_seed: 0x5eed_7e1e,
            block_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSettings {
    pub tone: ToneSettings,
    pub graph: GraphSettings,
}
