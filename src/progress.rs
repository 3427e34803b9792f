//! Hashing progress figures shared by both generation backends.

use std::time::{Duration, Instant};

use crate::utils::format_mm_ss;

pub const SPEED_PLACEHOLDER: &str = "-- MB/s";
pub const ETA_PLACEHOLDER: &str = "--:--";

const MIB: f64 = 1024.0 * 1024.0;

/// One progress observation, ready to display.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: u8,
    pub speed: String,
    pub eta: String,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>3}% | {} | ETA: {}", self.percent, self.speed, self.eta)
    }
}

/// Computes speed and ETA from units processed so far.
pub fn report(elapsed: Duration, done: u64, total: u64, unit_bytes: u64) -> Progress {
    let secs = elapsed.as_secs_f64();

    let percent = if total > 0 {
        ((done.min(total) as f64 / total as f64) * 100.0) as u8
    } else {
        0
    };

    let speed = if done > 0 && secs > 0.0 {
        format!("{:.2} MB/s", (done as f64 * unit_bytes as f64 / MIB) / secs)
    } else {
        SPEED_PLACEHOLDER.to_string()
    };

    let eta = if done > 0 && total > 0 {
        let estimated_total = secs / (done as f64 / total as f64);
        format_mm_ss((estimated_total - secs).max(0.0) as u64)
    } else {
        ETA_PLACEHOLDER.to_string()
    };

    Progress {
        percent,
        speed,
        eta,
    }
}

/// Remaining time extrapolated from a completion percentage:
/// `elapsed * 100 / percent - elapsed`.
pub fn extrapolate_eta(elapsed: Duration, percent: u8) -> String {
    if percent == 0 {
        return ETA_PLACEHOLDER.to_string();
    }
    let secs = elapsed.as_secs_f64();
    let remaining = secs * (100.0 / percent as f64) - secs;
    format_mm_ss(remaining.max(0.0) as u64)
}

/// Start time of one hashing run, owned by that run.
#[derive(Debug, Clone, Copy)]
pub struct HashTimer {
    started: Instant,
}

impl HashTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Restarts the clock when hashing reports its first (zero) tick, so
    /// setup time is not counted against throughput.
    pub fn observe(&mut self, done: u64) -> Duration {
        if done == 0 {
            self.started = Instant::now();
        }
        self.elapsed()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
