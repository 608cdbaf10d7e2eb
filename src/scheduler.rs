use std::time::{Duration, Instant};

/// Decides when the next compositing pass runs
pub trait Scheduler {
    /// Wait until the next pass is due and return its time since the start
    /// of the stream, or `None` once no more passes should run.
    fn next_tick(&mut self) -> Option<Duration>;
}

/// Paces passes to a target frame rate, sleeping away whatever is left of
/// each frame interval.
pub struct FixedRateScheduler {
    frame_duration: Duration,
    started: Instant,
    last_tick: Option<Instant>,
}

impl FixedRateScheduler {
    pub fn new(target_fps: u32) -> Self {
        let frame_duration = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
        Self {
            frame_duration,
            started: Instant::now(),
            last_tick: None,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}

impl Scheduler for FixedRateScheduler {
    fn next_tick(&mut self) -> Option<Duration> {
        if let Some(last) = self.last_tick {
            let elapsed = last.elapsed();
            if elapsed < self.frame_duration {
                std::thread::sleep(self.frame_duration - elapsed);
            }
        }

        let now = Instant::now();
        self.last_tick = Some(now);
        Some(now.duration_since(self.started))
    }
}
