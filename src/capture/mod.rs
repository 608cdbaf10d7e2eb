mod v4l_capture;

pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbaImage;
use std::time::{Duration, Instant};

/// A camera frame together with the playback time it was captured at
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbaImage,
    pub timestamp: Duration,
}

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture the current frame
    fn capture_frame(&mut self) -> Result<CapturedFrame>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

/// Detects whether a captured frame is new by comparing its timestamp with
/// the last one admitted.
#[derive(Debug, Default)]
pub struct FrameGate {
    last_seen: Option<Duration>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and remembers the timestamp if it differs from the last
    /// admitted one.
    pub fn admit(&mut self, timestamp: Duration) -> bool {
        if self.last_seen == Some(timestamp) {
            return false;
        }
        self.last_seen = Some(timestamp);
        true
    }
}

/// Stream-relative frame timestamps that strictly increase, even when the
/// system clock is too coarse to tell two deliveries apart.
#[derive(Debug)]
pub struct StreamClock {
    started: Instant,
    last: Option<Duration>,
}

impl StreamClock {
    const MIN_STEP: Duration = Duration::from_micros(1);

    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(started: Instant) -> Self {
        Self {
            started,
            last: None,
        }
    }

    /// Timestamp for a frame delivered now
    pub fn stamp(&mut self) -> Duration {
        self.stamp_at(Instant::now())
    }

    fn stamp_at(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.started);
        let timestamp = match self.last {
            Some(last) if elapsed <= last => last + Self::MIN_STEP,
            _ => elapsed,
        };
        self.last = Some(timestamp);
        timestamp
    }
}
