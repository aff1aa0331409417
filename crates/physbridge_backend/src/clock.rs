//! # Fixed Step Clock
//!
//! Splits variable tick durations into whole engine steps.
//!
//! ## Design
//!
//! The clock must:
//! - Advance the engine by exactly `fixed_step` every time
//! - Carry leftover time to the next tick
//! - Expose the leftover as an interpolation factor
//!
//! Time is accumulated in `f64` so that a long run of ticks does not
//! drift away from whole steps.

use crate::config::BackendConfig;

/// Leftover below this is treated as a whole step.
const STEP_TOLERANCE: f64 = 1e-9;

/// Stepping statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockStats {
    /// Ticks accumulated.
    pub ticks: u64,
    /// Ticks that ran no step.
    pub idle_ticks: u64,
    /// Most steps run by a single tick.
    pub max_steps_in_tick: u32,
    /// Ticks whose steps were cut by `max_steps_per_tick`.
    pub capped_ticks: u64,
    /// Ticks ignored because `dt` was not a finite non-negative number.
    pub rejected_ticks: u64,
}

/// Fixed timestep accumulator.
#[derive(Clone, Debug)]
pub struct FixedClock {
    /// Engine step, in seconds.
    fixed_step: f32,
    /// Step cap per tick. 0 means unbounded.
    max_steps: u32,
    /// Time not yet consumed by a step.
    accumulator: f64,
    /// Steps run during the current tick.
    steps_this_tick: u32,
    /// Total steps run.
    step_count: u64,
    /// Statistics.
    stats: ClockStats,
}

impl FixedClock {
    /// Creates a clock. `max_steps` of 0 disables the cap.
    #[must_use]
    pub fn new(fixed_step: f32, max_steps: u32) -> Self {
        Self {
            fixed_step,
            max_steps,
            accumulator: 0.0,
            steps_this_tick: 0,
            step_count: 0,
            stats: ClockStats::default(),
        }
    }

    /// Creates a clock from the backend configuration.
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.fixed_step, config.max_steps_per_tick)
    }

    /// Starts a tick by adding `dt` seconds.
    ///
    /// Returns false, without touching the accumulator, for a negative or
    /// non-finite `dt`.
    pub fn accumulate(&mut self, dt: f32) -> bool {
        self.finish_tick();
        self.stats.ticks += 1;
        if !(dt.is_finite() && dt >= 0.0) {
            self.stats.rejected_ticks += 1;
            tracing::warn!("Ignoring invalid tick duration {}", dt);
            return false;
        }
        self.accumulator += f64::from(dt);
        true
    }

    /// Consumes one fixed step if enough time has accumulated.
    ///
    /// Once the per-tick cap is reached the remaining whole steps are
    /// dropped and only the fraction is kept.
    pub fn next_step(&mut self) -> bool {
        let step = f64::from(self.fixed_step);
        if self.accumulator + STEP_TOLERANCE < step {
            return false;
        }
        if self.max_steps > 0 && self.steps_this_tick >= self.max_steps {
            let dropped = (self.accumulator / step).floor();
            self.accumulator = (self.accumulator - dropped * step).max(0.0);
            self.stats.capped_ticks += 1;
            tracing::debug!("Step cap reached, dropped {} steps", dropped);
            return false;
        }

        self.accumulator = (self.accumulator - step).max(0.0);
        self.steps_this_tick += 1;
        self.step_count += 1;
        true
    }

    /// Fraction of a step left over, in `[0, 1)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn alpha(&self) -> f32 {
        let alpha = self.accumulator / f64::from(self.fixed_step);
        alpha.clamp(0.0, 1.0) as f32
    }

    /// Engine step, in seconds.
    #[must_use]
    pub const fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// Time not yet consumed by a step.
    #[must_use]
    pub const fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Steps run since the last [`FixedClock::accumulate`].
    #[must_use]
    pub const fn steps_this_tick(&self) -> u32 {
        self.steps_this_tick
    }

    /// Total steps run.
    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Returns stepping statistics.
    #[must_use]
    pub const fn stats(&self) -> &ClockStats {
        &self.stats
    }

    /// Drops accumulated time and statistics.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.steps_this_tick = 0;
        self.step_count = 0;
        self.stats = ClockStats::default();
    }

    fn finish_tick(&mut self) {
        if self.stats.ticks == 0 {
            return;
        }
        if self.steps_this_tick == 0 {
            self.stats.idle_ticks += 1;
        }
        self.stats.max_steps_in_tick = self.stats.max_steps_in_tick.max(self.steps_this_tick);
        self.steps_this_tick = 0;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_tick(clock: &mut FixedClock, dt: f32) -> u32 {
        clock.accumulate(dt);
        let mut steps = 0;
        while clock.next_step() {
            steps += 1;
        }
        steps
    }

    #[test]
    fn test_three_ticks_three_steps() {
        let mut clock = FixedClock::new(1.0 / 60.0, 0);

        let steps: u32 = (0..3).map(|_| run_tick(&mut clock, 1.0 / 60.0)).sum();

        assert_eq!(steps, 3);
        assert_eq!(clock.step_count(), 3);
        assert!(clock.accumulator().abs() < f64::EPSILON);
    }

    #[test]
    fn test_leftover_carries_over() {
        let mut clock = FixedClock::new(0.1, 0);

        assert_eq!(run_tick(&mut clock, 0.05), 0);
        assert!((clock.alpha() - 0.5).abs() < 1e-5);
        assert_eq!(run_tick(&mut clock, 0.06), 1);
        assert!((clock.alpha() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_large_tick_runs_many_steps() {
        let mut clock = FixedClock::new(1.0 / 60.0, 0);
        assert_eq!(run_tick(&mut clock, 0.5), 30);
        assert_eq!(clock.steps_this_tick(), 30);
    }

    #[test]
    fn test_step_cap_drops_whole_steps() {
        let mut clock = FixedClock::new(0.1, 2);

        assert_eq!(run_tick(&mut clock, 0.55), 2);
        assert!((clock.alpha() - 0.5).abs() < 1e-4);
        assert_eq!(clock.stats().capped_ticks, 1);

        // Nothing left to catch up on
        assert_eq!(run_tick(&mut clock, 0.0), 0);
    }

    #[test]
    fn test_invalid_dt_is_ignored() {
        let mut clock = FixedClock::new(0.1, 0);
        assert!(!clock.accumulate(f32::NAN));
        assert!(!clock.accumulate(-1.0));
        assert!(!clock.next_step());
        assert_eq!(clock.stats().rejected_ticks, 2);
        assert!(clock.accumulator().abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_and_reset() {
        let mut clock = FixedClock::new(0.1, 0);
        run_tick(&mut clock, 0.01);
        run_tick(&mut clock, 0.35);
        run_tick(&mut clock, 0.0);

        assert_eq!(clock.stats().max_steps_in_tick, 3);
        assert_eq!(clock.stats().idle_ticks, 1);

        clock.reset();
        assert_eq!(clock.step_count(), 0);
        assert_eq!(clock.stats().ticks, 0);
    }
}
