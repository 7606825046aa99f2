// SPDX-License-Identifier: CEPL-1.0
//! Fixed-timestep frame clock.
//!
//! The driver feeds real elapsed time in with [`FixedTimestep::advance`] and
//! gets back how many fixed update steps to run before drawing. Catch-up is
//! capped at `max_steps`; whatever backlog remains past the cap is dropped so
//! one slow frame cannot snowball into ever longer update bursts.

use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FixedTimestep {
    step: Duration,
    max_steps: u32,
    accumulator: Duration,
    total_steps: u64,
    dropped: Duration,
}

impl FixedTimestep {
    /// `hz` of 0 is treated as 1.
    pub fn new(hz: u32, max_steps: u32) -> Self {
        let hz = hz.max(1);
        Self {
            step: Duration::from_nanos(1_000_000_000 / u64::from(hz)),
            max_steps: max_steps.max(1),
            accumulator: Duration::ZERO,
            total_steps: 0,
            dropped: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Total time discarded by the catch-up clamp so far.
    pub fn dropped(&self) -> Duration {
        self.dropped
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Adds `elapsed` and returns the number of update steps due this tick.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps {
            self.accumulator -= self.step;
            steps += 1;
        }

        // Keep at most one partial step of backlog after clamping.
        if self.accumulator >= self.step {
            let keep = Duration::from_nanos(
                (self.accumulator.as_nanos() % self.step.as_nanos()) as u64,
            );
            let lost = self.accumulator - keep;
            self.dropped += lost;
            self.accumulator = keep;
            debug!(
                "frame clock: catch-up clamped at {} steps, dropped {:.2} ms",
                self.max_steps,
                lost.as_secs_f64() * 1000.0
            );
        }

        self.total_steps += u64::from(steps);
        steps
    }

    /// Interpolation fraction in `[0, 1)` between the last and next update.
    pub fn alpha(&self) -> f32 {
        (self.accumulator.as_secs_f64() / self.step.as_secs_f64()) as f32
    }

    /// Drops any partial step, e.g. when resuming after a pause.
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_step_before_a_full_period() {
        let mut clock = FixedTimestep::new(100, 5);
        assert_eq!(clock.advance(Duration::from_millis(4)), 0);
        assert_eq!(clock.advance(Duration::from_millis(4)), 0);
        assert_eq!(clock.advance(Duration::from_millis(4)), 1);
        assert!(clock.alpha() > 0.15 && clock.alpha() < 0.25);
    }

    #[test]
    fn test_multiple_steps_when_behind() {
        let mut clock = FixedTimestep::new(100, 5);
        assert_eq!(clock.advance(Duration::from_millis(30)), 3);
        assert_eq!(clock.total_steps(), 3);
        assert_eq!(clock.dropped(), Duration::ZERO);
    }

    #[test]
    fn test_catch_up_is_clamped() {
        let mut clock = FixedTimestep::new(100, 4);
        // Two seconds behind would be 200 steps without the clamp.
        assert_eq!(clock.advance(Duration::from_secs(2)), 4);
        assert!(clock.dropped() >= Duration::from_millis(1950));
        // The backlog is gone, so the next short tick runs nothing.
        assert_eq!(clock.advance(Duration::from_millis(1)), 0);
    }

    #[test]
    fn test_zero_rate_is_sanitized() {
        let clock = FixedTimestep::new(0, 0);
        assert_eq!(clock.step(), Duration::from_secs(1));
        assert_eq!(clock.max_steps(), 1);
    }

    #[test]
    fn test_reset_drops_partial_step() {
        let mut clock = FixedTimestep::new(100, 5);
        assert_eq!(clock.advance(Duration::from_millis(15)), 1);
        assert!(clock.alpha() > 0.4);
        clock.reset();
        assert_eq!(clock.alpha(), 0.0);
        assert_eq!(clock.advance(Duration::from_millis(9)), 0);
        assert_eq!(clock.total_steps(), 1);
    }
}
