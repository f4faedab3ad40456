//! Presentation-clock and audio-clock time types, plus the clocks the
//! reveal driver suspends on.
//!
//! Two independent domains exist:
//!
//! - [`PresentationTime`]: milliseconds on the frame clock, the only clock
//!   visual code can read.
//! - [`AudioTime`]: seconds on the audio device clock, used for
//!   sample-accurate tone scheduling.
//!
//! [`ClockSynchronizer`](crate::ClockSynchronizer) converts between them.

use std::ops::{Add, Sub};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::lock;

/// Milliseconds on the presentation (frame) clock.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct PresentationTime(pub f64);

impl PresentationTime {
    pub fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    pub fn as_millis(self) -> f64 {
        self.0
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: PresentationTime) -> Duration {
        Duration::from_nanos(((self.0 - earlier.0) * 1e6).max(0.0).round() as u64)
    }
}

impl Add<Duration> for PresentationTime {
    type Output = PresentationTime;

    fn add(self, rhs: Duration) -> Self::Output {
        PresentationTime(self.0 + rhs.as_secs_f64() * 1000.0)
    }
}

impl Sub<Duration> for PresentationTime {
    type Output = PresentationTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        PresentationTime(self.0 - rhs.as_secs_f64() * 1000.0)
    }
}

/// Seconds on the audio device clock.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct AudioTime(pub f64);

impl AudioTime {
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// Index of the sample that plays at this instant.
    pub fn to_sample(self, sample_rate: u32) -> u64 {
        (self.0.max(0.0) * f64::from(sample_rate)).round() as u64
    }
}

impl Add<Duration> for AudioTime {
    type Output = AudioTime;

    fn add(self, rhs: Duration) -> Self::Output {
        AudioTime(self.0 + rhs.as_secs_f64())
    }
}

/// Read access to the presentation clock.
pub trait PresentationClock: Send + Sync {
    fn now(&self) -> PresentationTime;
}

/// The two suspension points of a reveal: timer delays and frame callbacks.
#[async_trait::async_trait]
pub trait RevealClock: PresentationClock {
    async fn sleep(&self, duration: Duration);

    /// Resolves at the next frame and returns its timestamp.
    async fn next_frame(&self) -> PresentationTime;

    /// Timestamp the next call to [`RevealClock::next_frame`] would resolve with.
    fn next_frame_time(&self) -> PresentationTime;
}

pub const DEFAULT_FRAME_RATE: f64 = 60.0;

/// Deterministic clock for tests and offline runs.
///
/// Sleeping and waiting for a frame advance virtual time immediately, so a
/// whole reveal completes without touching a real timer.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    inner: Arc<Mutex<VirtualState>>,
}

#[derive(Debug)]
struct VirtualState {
    now_ms: f64,
    frame_interval_ms: f64,
    last_frame: u64,
    frames: u64,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::with_frame_rate(DEFAULT_FRAME_RATE)
    }
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_rate(frames_per_second: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VirtualState {
                now_ms: 0.0,
                frame_interval_ms: 1000.0 / frames_per_second.max(1.0),
                last_frame: 0,
                frames: 0,
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        lock(&self.inner).now_ms += duration.as_secs_f64() * 1000.0;
    }

    /// Number of frames delivered so far.
    pub fn frames_presented(&self) -> u64 {
        lock(&self.inner).frames
    }
}

impl VirtualState {
    fn upcoming_frame(&self) -> u64 {
        let mut index = ((self.now_ms / self.frame_interval_ms).floor() as u64 + 1)
            .max(self.last_frame + 1);
        // Frame timestamps must strictly increase even under float rounding.
        while index as f64 * self.frame_interval_ms <= self.now_ms {
            index += 1;
        }
        index
    }
}

impl PresentationClock for VirtualClock {
    fn now(&self) -> PresentationTime {
        PresentationTime(lock(&self.inner).now_ms)
    }
}

#[async_trait::async_trait]
impl RevealClock for VirtualClock {
    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    async fn next_frame(&self) -> PresentationTime {
        let mut state = lock(&self.inner);
        let index = state.upcoming_frame();
        state.last_frame = index;
        state.frames += 1;
        state.now_ms = index as f64 * state.frame_interval_ms;
        PresentationTime(state.now_ms)
    }

    fn next_frame_time(&self) -> PresentationTime {
        let state = lock(&self.inner);
        PresentationTime(state.upcoming_frame() as f64 * state.frame_interval_ms)
    }
}

/// Wall clock backed by tokio timers, with frames on a fixed cadence.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    frame_interval: Duration,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

impl TokioClock {
    pub fn new(frames_per_second: f64) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            frame_interval: Duration::from_secs_f64(1.0 / frames_per_second.max(1.0)),
        }
    }

    fn upcoming_frame(&self) -> u32 {
        let elapsed = self.origin.elapsed().as_secs_f64();
        (elapsed / self.frame_interval.as_secs_f64()).floor() as u32 + 1
    }
}

impl PresentationClock for TokioClock {
    fn now(&self) -> PresentationTime {
        PresentationTime(self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

#[async_trait::async_trait]
impl RevealClock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn next_frame(&self) -> PresentationTime {
        let deadline = self.origin + self.frame_interval * self.upcoming_frame();
        tokio::time::sleep_until(deadline).await;
        self.now()
    }

    fn next_frame_time(&self) -> PresentationTime {
        let at = self.frame_interval * self.upcoming_frame();
        PresentationTime(at.as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn virtual_frames_strictly_increase() {
        let clock = VirtualClock::with_frame_rate(60.0);
        let first = clock.next_frame().await;
        let second = clock.next_frame().await;
        assert!(second > first);
        assert!((second.as_millis() - first.as_millis() - 1000.0 / 60.0).abs() < 1e-6);
        assert_eq!(clock.frames_presented(), 2);
    }

    #[tokio::test]
    async fn virtual_frame_after_sleep_lands_on_next_boundary() {
        let clock = VirtualClock::with_frame_rate(50.0);
        clock.sleep(Duration::from_millis(45)).await;
        assert_eq!(clock.next_frame_time(), PresentationTime(60.0));
        assert_eq!(clock.next_frame().await, PresentationTime(60.0));
        assert_eq!(clock.now(), PresentationTime(60.0));
    }

    #[test]
    fn presentation_time_arithmetic() {
        let t = PresentationTime(100.0) + Duration::from_millis(70);
        assert!((t.as_millis() - 170.0).abs() < 1e-9);
        assert_eq!(
            PresentationTime(10.0).saturating_since(PresentationTime(30.0)),
            Duration::ZERO
        );
        assert_eq!(AudioTime(0.5).to_sample(48_000), 24_000);
    }
}
