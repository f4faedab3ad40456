//! Optional RON settings file.
//!
//! Every field is optional and expressed in plain units (milliseconds,
//! hertz, linear gain); anything left out keeps the engine default.
//!
//! ```ron
//! (
//!     reveal: (chunk_settle_ms: Some(90), tone_lead_ms: Some(80)),
//!     tone: (mid_frequency: Some(880.0)),
//! )
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use teletype_engine::{AudioSettings, FetchSettings, RevealTimings};

#[derive(Debug, Clone, Default)]
pub(crate) struct AppConfig {
    pub fetch: FetchSettings,
    pub timings: RevealTimings,
    pub audio: AudioSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    fetch: FetchOverrides,
    reveal: RevealOverrides,
    tone: ToneOverrides,
    graph: GraphOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FetchOverrides {
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    redirect_limit: Option<usize>,
    max_bytes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RevealOverrides {
    chunk_settle_ms: Option<u64>,
    item_settle_ms: Option<u64>,
    follow_lead_ms: Option<u64>,
    follow_trail_ms: Option<u64>,
    tone_lead_ms: Option<u64>,
    frame_tolerance_ms: Option<u64>,
    notice_dismiss_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ToneOverrides {
    min_lead_ms: Option<u64>,
    rate_limit_ms: Option<u64>,
    mid_frequency: Option<f32>,
    final_frequency: Option<f32>,
    scheduled_length_ms: Option<u64>,
    immediate_length_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GraphOverrides {
    sample_rate: Option<u32>,
    master_gain: Option<f32>,
    sfx_gain: Option<f32>,
    ambience_gain: Option<f32>,
    reverb_length_ms: Option<u64>,
    noise_seed: Option<u64>,
}

pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing config file {}", path.display()))
}

pub(crate) fn parse(text: &str) -> anyhow::Result<AppConfig> {
    let file: ConfigFile = ron::from_str(text)?;
    let mut config = AppConfig::default();
    file.apply(&mut config);
    Ok(config)
}

fn ms(value: Option<u64>, target: &mut Duration) {
    if let Some(value) = value {
        *target = Duration::from_millis(value);
    }
}

fn set<T>(value: Option<T>, target: &mut T) {
    if let Some(value) = value {
        *target = value;
    }
}

impl ConfigFile {
    fn apply(self, config: &mut AppConfig) {
        let fetch = &mut config.fetch;
        ms(self.fetch.connect_timeout_ms, &mut fetch.connect_timeout);
        ms(self.fetch.request_timeout_ms, &mut fetch.request_timeout);
        set(self.fetch.redirect_limit, &mut fetch.redirect_limit);
        set(self.fetch.max_bytes, &mut fetch.max_bytes);

        let timings = &mut config.timings;
        ms(self.reveal.chunk_settle_ms, &mut timings.chunk_settle);
        ms(self.reveal.item_settle_ms, &mut timings.item_settle);
        ms(self.reveal.follow_lead_ms, &mut timings.follow_lead);
        ms(self.reveal.follow_trail_ms, &mut timings.follow_trail);
        ms(self.reveal.tone_lead_ms, &mut timings.tone_lead);
        ms(self.reveal.frame_tolerance_ms, &mut timings.frame_tolerance);
        ms(self.reveal.notice_dismiss_ms, &mut timings.notice_dismiss);

        let tone = &mut config.audio.tone;
        ms(self.tone.min_lead_ms, &mut tone.min_lead);
        ms(self.tone.rate_limit_ms, &mut tone.rate_limit);
        set(self.tone.mid_frequency, &mut tone.mid_frequency);
        set(self.tone.final_frequency, &mut tone.final_frequency);
        ms(self.tone.scheduled_length_ms, &mut tone.scheduled_length);
        ms(self.tone.immediate_length_ms, &mut tone.immediate_length);

        let graph = &mut config.audio.graph;
        set(self.graph.sample_rate, &mut graph.sample_rate);
        set(self.graph.master_gain, &mut graph.master_gain);
        set(self.graph.sfx_gain, &mut graph.sfx_gain);
        set(self.graph.ambience_gain, &mut graph.ambience_gain);
        ms(self.graph.reverb_length_ms, &mut graph.reverb_length);
        set(self.graph.noise_seed, &mut graph.noise_seed);
    }
}
