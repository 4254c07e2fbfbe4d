//! Time management for the frame loop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Manages frame timing and delta time calculation.
#[derive(Debug)]
pub struct Time {
    /// Time when the engine started.
    start_time: Instant,
    /// Time of the last frame.
    last_frame: Instant,
    /// Duration of the last frame.
    delta: Duration,
    /// Total elapsed time since start.
    elapsed: Duration,
    /// Frame count since start.
    frame_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    /// Create a new time manager.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_frame: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Update timing at the start of a new frame.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.elapsed = now - self.start_time;
        self.frame_count += 1;
    }

    /// Get the delta time in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get the delta time as a Duration.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Get total elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Get the current frame count.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Number of frame deltas averaged into the reported FPS.
pub const PROFILER_WINDOW: usize = 4;
/// Minimum time between two title refreshes.
pub const TITLE_REFRESH_SECONDS: f64 = 0.5;

/// Moving-average FPS counter that produces a window title at a fixed cadence.
///
/// Fed with the elapsed time (seconds since start) once per frame. Zero deltas
/// (two samples at the same timestamp) are ignored so the average never divides by zero.
#[derive(Debug, Clone)]
pub struct FrameProfiler {
    base_title: String,
    last_time: f64,
    last_title_change: f64,
    samples: VecDeque<f64>,
    delta: f64,
}

impl FrameProfiler {
    pub fn new(base_title: impl Into<String>) -> Self {
        Self {
            base_title: base_title.into(),
            last_time: 0.0,
            last_title_change: 0.0,
            samples: VecDeque::with_capacity(PROFILER_WINDOW),
            delta: 0.0,
        }
    }

    /// Record a frame at `now` seconds. Returns a new title when one is due.
    pub fn tick(&mut self, now: f64) -> Option<String> {
        self.delta = now - self.last_time;
        self.last_time = now;

        if self.delta <= 0.0 {
            return None;
        }

        if self.samples.len() == PROFILER_WINDOW {
            self.samples.pop_back();
        }
        self.samples.push_front(1.0 / self.delta);

        if now - self.last_title_change >= TITLE_REFRESH_SECONDS {
            self.last_title_change = now;
            return Some(format!("{} ({:.0} FPS)", self.base_title, self.mean_fps()));
        }
        None
    }

    /// Mean FPS over the last [`PROFILER_WINDOW`] frames. Slots not yet filled count as zero,
    /// so the first few frames read low.
    pub fn mean_fps(&self) -> f64 {
        self.samples.iter().sum::<f64>() / PROFILER_WINDOW as f64
    }

    /// Last frame delta in seconds.
    pub fn delta_seconds(&self) -> f64 {
        self.delta
    }

    pub fn set_base_title(&mut self, title: impl Into<String>) {
        self.base_title = title.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_fps_averages_last_four_frames() {
        let mut p = FrameProfiler::new("Lab");
        let mut t = 0.0;
        for _ in 0..6 {
            t += 0.01;
            p.tick(t);
        }
        assert!((p.mean_fps() - 100.0).abs() < 1e-6, "mean was {}", p.mean_fps());
    }

    #[test]
    fn zero_delta_is_ignored() {
        let mut p = FrameProfiler::new("Lab");
        p.tick(0.02);
        let before = p.mean_fps();
        assert!(p.tick(0.02).is_none());
        assert_eq!(p.mean_fps(), before);
    }

    #[test]
    fn title_refreshes_at_most_every_half_second() {
        let mut p = FrameProfiler::new("Lab");
        let mut titles = Vec::new();
        // 1/64 s frames are exact in binary, so refreshes land on 0.5, 1.0, 1.5, 2.0
        for frame in 1..=128 {
            if let Some(title) = p.tick(frame as f64 / 64.0) {
                titles.push(title);
            }
        }
        assert_eq!(titles.len(), 4);
        assert!(titles.iter().all(|s| s.starts_with("Lab (") && s.ends_with(" FPS)")));
        assert_eq!(titles.last().map(String::as_str), Some("Lab (64 FPS)"));
    }
}
