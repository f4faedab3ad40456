//! Tone synthesis, the mix graph, the device contract and clock mapping.

mod ambience;
mod device;
mod dsp;
mod engine;
mod graph;
mod preference;
mod reverb;
mod settings;
mod sync;
mod voice;

pub use device::{
    AudioDevice, AudioError, AudioHost, OfflineDevice, OfflineHost, OfflineOptions,
    OfflineRecorder, OutputTimestamp, RENDER_QUANTUM,
};
pub use dsp::{Biquad, Compressor};
pub use engine::{AudioEngine, AudioLifecycle, ScheduledTone, SharedAudio, ToneRejected};
pub use graph::MixGraph;
pub use preference::{MemoryPreferenceStore, PreferenceStore, SOUND_PREFERENCE_KEY};
pub use reverb::{impulse_response, Convolver};
pub use settings::{AudioSettings, CompressorSettings, GraphSettings, TonePitch, ToneSettings};
pub use sync::{ClockSynchronizer, SyncPath, SyncedTime};
pub use voice::{ToneVoice, VoiceOutput, VoiceRenderer};
