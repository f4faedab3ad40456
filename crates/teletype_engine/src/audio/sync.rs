use super::device::AudioDevice;
use crate::clock::{AudioTime, PresentationTime};

/// Which mapping produced a [`SyncedTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPath {
    /// The device's own paired clock reading, which includes output latency.
    OutputTimestamp,
    /// The offset between the two clocks sampled at call time.
    Offset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncedTime {
    pub presentation: PresentationTime,
    pub path: SyncPath,
}

/// Maps audio-clock instants onto the presentation clock.
///
/// Stateless: the mapping is taken fresh on every call, so drift only has
/// to be negligible over one scheduling horizon.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSynchronizer;

impl ClockSynchronizer {
    /// Presentation time at which audio time `target` becomes audible.
    /// `now` is the presentation time the caller sampled for this request.
    pub fn to_presentation(
        device: &dyn AudioDevice,
        target: AudioTime,
        now: PresentationTime,
    ) -> SyncedTime {
        if let Some(ts) = device.output_timestamp() {
            let ms = ts.performance_time.as_millis()
                + (target.as_secs() - ts.context_time.as_secs()) * 1000.0;
            return SyncedTime {
                presentation: PresentationTime(ms),
                path: SyncPath::OutputTimestamp,
            };
        }
        let offset_s = now.as_millis() / 1000.0 - device.current_time().as_secs();
        SyncedTime {
            presentation: PresentationTime((target.as_secs() + offset_s) * 1000.0),
            path: SyncPath::Offset,
        }
    }
}
