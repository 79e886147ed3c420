//! Capture pacing driven by the simulation tick

use std::time::Duration;

use crate::{BridgeError, Result};

/// Slowest accepted capture rate, one frame every 1000 seconds
pub const MIN_CAPTURE_FPS: f64 = 1e-3;

/// Accumulates tick deltas and fires once per capture interval.
///
/// When the accumulator reaches the interval it is reset to zero, so a long
/// tick produces a single capture rather than a burst of catch-up captures.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    interval: Duration,
    accumulated: Duration,
}

impl CaptureClock {
    /// Create a clock for a target rate in frames per second.
    ///
    /// Fails for rates that are not finite or below [`MIN_CAPTURE_FPS`].
    pub fn from_fps(target_fps: f64) -> Result<Self> {
        if !target_fps.is_finite() || target_fps < MIN_CAPTURE_FPS {
            return Err(BridgeError::config(format!(
                "target_fps must be finite and at least {}, got {}",
                MIN_CAPTURE_FPS, target_fps
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / target_fps)
            .map_err(|e| BridgeError::config(format!("target_fps {}: {}", target_fps, e)))?;
        Ok(Self::new(interval))
    }

    /// Create a clock with an explicit capture interval
    pub fn new(interval: Duration) -> Self {
        Self { interval, accumulated: Duration::ZERO }
    }

    /// Add elapsed time; returns true when a capture is due
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.accumulated = self.accumulated.saturating_add(dt);
        if self.accumulated >= self.interval {
            self.accumulated = Duration::ZERO;
            true
        } else {
            false
        }
    }

    /// Time between captures
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time accumulated since the last capture
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }
}
