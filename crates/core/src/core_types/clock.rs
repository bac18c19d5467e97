//! Simulation clock and coupling schedule
//!
//! Time inside the model is an integer count of elapsed model steps.
//! Sub-step boundaries are always aligned to these integers, never
//! interpolated, which is what makes the scheduler's `clock == target`
//! postcondition exact rather than a floating-point comparison.

use crate::core_types::units::Seconds;
use serde::{Deserialize, Serialize};

/// Integer counter of elapsed model steps since the start of the run
///
/// Convertible to and from real time through a fixed steps-per-second
/// scale factor that is immutable for the life of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationClock {
    step: u64,
    steps_per_second: f64,
}

impl SimulationClock {
    /// Create a clock at step zero.
    ///
    /// # Arguments
    ///
    /// * `steps_per_second` - Fixed scale factor between model steps and
    ///   real time. Must be strictly positive.
    #[must_use]
    #[track_caller]
    pub fn new(steps_per_second: f64) -> Self {
        assert!(
            steps_per_second > 0.0 && steps_per_second.is_finite(),
            "SimulationClock::new: steps_per_second must be positive and finite, got {steps_per_second}"
        );
        Self {
            step: 0,
            steps_per_second,
        }
    }

    /// Current model step.
    #[inline]
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Duration of one model step.
    #[must_use]
    pub fn step_duration(&self) -> Seconds {
        Seconds::new(1.0 / self.steps_per_second)
    }

    /// Elapsed real time at the current step.
    #[must_use]
    pub fn elapsed(&self) -> Seconds {
        Seconds::new(self.step as f64 / self.steps_per_second)
    }

    /// Real time corresponding to an arbitrary step count.
    #[must_use]
    pub fn seconds_at(&self, step: u64) -> Seconds {
        Seconds::new(step as f64 / self.steps_per_second)
    }

    /// Convert real time to an exact step count.
    ///
    /// Conversion must be exact: asserts (rather than silently rounding)
    /// if `t` is not an integer multiple of the step duration.
    #[must_use]
    #[track_caller]
    pub fn steps_from_seconds(&self, t: Seconds) -> u64 {
        let steps = *t * self.steps_per_second;
        let rounded = steps.round();
        assert!(
            (steps - rounded).abs() < 1e-9 * rounded.max(1.0),
            "steps_from_seconds: {t} is not an integer multiple of the step duration {}",
            self.step_duration()
        );
        rounded as u64
    }

    /// Advance the clock to a later step. Time never moves backwards.
    #[track_caller]
    pub fn advance_to(&mut self, step: u64) {
        assert!(
            step >= self.step,
            "SimulationClock::advance_to: cannot rewind from step {} to {step}",
            self.step
        );
        self.step = step;
    }
}

/// Coupling interval expressed in model steps
///
/// Every coupling boundary is an exact multiple of the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingSchedule {
    interval: u64,
}

impl CouplingSchedule {
    /// Create a schedule with the given interval in model steps.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimulationError::InvalidConfig`] if `interval` is zero.
    pub fn new(interval: u64) -> Result<Self, crate::SimulationError> {
        if interval == 0 {
            return Err(crate::SimulationError::InvalidConfig(
                "coupling interval must be positive".to_string(),
            ));
        }
        Ok(Self { interval })
    }

    /// Interval in model steps.
    #[inline]
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Whether `step` lies on a coupling boundary.
    #[inline]
    #[must_use]
    pub fn is_boundary(&self, step: u64) -> bool {
        step % self.interval == 0
    }

    /// The next coupling boundary strictly after `step`.
    #[inline]
    #[must_use]
    pub fn next_boundary_after(&self, step: u64) -> u64 {
        (step / self.interval + 1) * self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        let clock = SimulationClock::new(2.0);
        assert_eq!(clock.step(), 0);
        assert_eq!(*clock.elapsed(), 0.0);
        assert_eq!(*clock.step_duration(), 0.5);
    }

    #[test]
    fn test_exact_time_conversion() {
        let clock = SimulationClock::new(4.0);
        assert_eq!(clock.steps_from_seconds(Seconds::new(2.5)), 10);
        assert_eq!(*clock.seconds_at(10), 2.5);
    }

    #[test]
    #[should_panic(expected = "not an integer multiple")]
    fn test_inexact_time_conversion_asserts() {
        // 0.3 s at 4 steps/s is 1.2 steps: must fail, not round
        let clock = SimulationClock::new(4.0);
        let _ = clock.steps_from_seconds(Seconds::new(0.3));
    }

    #[test]
    #[should_panic(expected = "cannot rewind")]
    fn test_clock_never_rewinds() {
        let mut clock = SimulationClock::new(1.0);
        clock.advance_to(5);
        clock.advance_to(4);
    }

    #[test]
    fn test_schedule_rejects_zero_interval() {
        assert!(CouplingSchedule::new(0).is_err());
    }

    #[test]
    fn test_boundary_queries() {
        let sched = CouplingSchedule::new(4).unwrap();
        assert!(sched.is_boundary(0));
        assert!(sched.is_boundary(8));
        assert!(!sched.is_boundary(6));
        assert_eq!(sched.next_boundary_after(0), 4);
        assert_eq!(sched.next_boundary_after(3), 4);
        assert_eq!(sched.next_boundary_after(4), 8);
    }
}
