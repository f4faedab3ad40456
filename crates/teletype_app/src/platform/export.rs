//! Session exports: the rendered audio as WAV and the reveal events as JSON.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use teletype_core::NavigationId;
use teletype_engine::{AtomicFileWriter, OfflineRecorder, RevealEvent};

/// Audio rendered past the last voice so reverb tails are not cut off.
const RENDER_TAIL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize)]
struct TranscriptEntry {
    navigation: NavigationId,
    #[serde(flatten)]
    event: RevealEvent,
}

/// Every reveal event seen this session, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub(crate) fn record(&mut self, navigation: NavigationId, event: RevealEvent) {
        self.entries.push(TranscriptEntry { navigation, event });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

pub(crate) fn write_transcript(transcript: &Transcript, path: &Path) -> anyhow::Result<PathBuf> {
    let json = transcript.to_json().context("serializing transcript")?;
    write_atomically(path, json.as_bytes())
}

pub(crate) fn write_wav(recorder: &OfflineRecorder, path: &Path) -> anyhow::Result<PathBuf> {
    let sample_rate = recorder
        .sample_rate()
        .context("no audio was produced this session")?;
    let samples = recorder.render_session(RENDER_TAIL);
    let bytes = encode_wav(&samples, sample_rate).context("encoding WAV")?;
    write_atomically(path, &bytes)
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} does not name a file", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let written = AtomicFileWriter::new(dir)
        .write(filename, bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(written)
}
