//! Coupled step scheduler
//!
//! Drives the two subsystems from one coupling boundary to the next.
//! The scheduling decision is a merge of two independent, monotonically
//! increasing event streams (the coupling boundaries and the observation
//! checkpoints) by taking the minimum next event time, like merging two
//! sorted streams. Ties are resolved by performing the coupling exchange
//! and the observation at the same instant without duplicating work.
//!
//! The scheduler mutates only the shared state, the clock and the two
//! adapters. It never writes output; recording is the driver's concern,
//! which keeps this module free of I/O.

use crate::core_types::{CouplingSchedule, SimulationClock, ThermodynamicState};
use crate::dynamics::DynamicsAdapter;
use crate::error::SimulationError;
use crate::microphysics::MicrophysicsAdapter;
use tracing::{debug, trace};

/// External capability that schedules observation checkpoints
///
/// Progress contract: the returned step is always strictly greater than
/// the current step, otherwise the run terminates with an error.
pub trait ObservationSchedule {
    /// The step of the next observation event after `step`.
    fn next_observation(&mut self, step: u64) -> u64;
}

impl<O: ObservationSchedule + ?Sized> ObservationSchedule for Box<O> {
    fn next_observation(&mut self, step: u64) -> u64 {
        (**self).next_observation(step)
    }
}

/// Observer that never interrupts a coupling interval
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl ObservationSchedule for NoObserver {
    fn next_observation(&mut self, _step: u64) -> u64 {
        u64::MAX
    }
}

/// Observer firing at every multiple of a fixed period
#[derive(Debug, Clone, Copy)]
pub struct PeriodicObserver {
    every: u64,
}

impl PeriodicObserver {
    /// Create a periodic observer. Asserts `every > 0`.
    #[must_use]
    #[track_caller]
    pub fn new(every: u64) -> Self {
        assert!(every > 0, "PeriodicObserver::new: period must be positive");
        Self { every }
    }
}

impl ObservationSchedule for PeriodicObserver {
    fn next_observation(&mut self, step: u64) -> u64 {
        (step / self.every + 1) * self.every
    }
}

/// Merge of two observation streams: whichever fires first wins
#[derive(Debug, Clone)]
pub struct MergeObservers<A, B>(pub A, pub B);

impl<A: ObservationSchedule, B: ObservationSchedule> ObservationSchedule for MergeObservers<A, B> {
    fn next_observation(&mut self, step: u64) -> u64 {
        self.0.next_observation(step).min(self.1.next_observation(step))
    }
}

/// Sequences the dynamics and microphysics adapters over one coupling
/// interval at a time
#[derive(Debug, Clone, Copy)]
pub struct CoupledStepScheduler {
    schedule: CouplingSchedule,
}

impl CoupledStepScheduler {
    /// Create a scheduler for the given coupling schedule.
    #[must_use]
    pub fn new(schedule: CouplingSchedule) -> Self {
        Self { schedule }
    }

    /// The coupling schedule this scheduler follows.
    #[must_use]
    pub fn schedule(&self) -> CouplingSchedule {
        self.schedule
    }

    /// Advance the coupled system from the current coupling boundary to
    /// the next one, respecting each subsystem's sub-stepping and any
    /// observation checkpoints that fall inside the interval.
    ///
    /// On return the clock sits exactly on the next coupling boundary and
    /// exactly one receive/send exchange has been performed.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Desynchronization`] if the clock does not enter
    /// on a coupling boundary or an observer violates its progress
    /// contract; [`SimulationError::StepMismatch`] propagated from the
    /// dynamics adapter when a merged sub-interval does not equal its
    /// fixed step.
    pub fn advance_coupling_interval(
        &self,
        state: &mut ThermodynamicState,
        clock: &mut SimulationClock,
        dynamics: &mut dyn DynamicsAdapter,
        microphysics: &mut dyn MicrophysicsAdapter,
        observer: &mut dyn ObservationSchedule,
    ) -> Result<(), SimulationError> {
        let start = clock.step();
        if !self.schedule.is_boundary(start) {
            return Err(SimulationError::Desynchronization {
                step: start,
                expected: self.schedule.next_boundary_after(start),
            });
        }
        let target = start + self.schedule.interval();
        debug!(start, target, "advancing coupling interval");

        while clock.step() < target {
            let now = clock.step();

            // Merge the two event streams: the earlier of the next
            // coupling boundary and the next observation wins; the target
            // caps the horizon
            let boundary = self.schedule.next_boundary_after(now);
            let observation = observer.next_observation(now);
            if observation <= now {
                return Err(SimulationError::Desynchronization {
                    step: now,
                    expected: now + 1,
                });
            }
            let next_stop = boundary.min(observation).min(target);
            trace!(now, next_stop, boundary, observation, "merged sub-interval");

            // Receive: dynamics hands its authoritative fields to the
            // shared state, but only when entering at a coupling boundary
            if self.schedule.is_boundary(now) {
                dynamics.receive(state)?;
            }

            microphysics.at_start_step(now, state);
            dynamics.advance(now, next_stop, state)?;
            microphysics.run_step(now, next_stop, state)?;

            // Send: the shared state (now carrying the microphysics
            // update) goes back into the dynamics representation at the
            // closing boundary only
            if self.schedule.is_boundary(next_stop) {
                dynamics.send(state)?;
            }

            clock.advance_to(next_stop);
        }

        // Sub-step boundaries are integer model steps, so the loop lands
        // on the target exactly; anything else is a logic bug
        if clock.step() != target {
            return Err(SimulationError::Desynchronization {
                step: clock.step(),
                expected: target,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Seconds;
    use crate::dynamics::{KinematicConfig, KinematicDriver};
    use crate::microphysics::{SaturationAdjustment, SaturationConfig};
    use crate::ReferenceScales;

    fn fixtures() -> (KinematicDriver, SaturationAdjustment, ThermodynamicState) {
        let dynamics = KinematicDriver::new(
            KinematicConfig {
                n_cells: 20,
                dz: 100.0,
                step_len: 1,
                ..KinematicConfig::default()
            },
            Seconds::new(1.0),
        )
        .unwrap();
        let state = dynamics.initial_state().unwrap();
        let mut micro = SaturationAdjustment::new(
            SaturationConfig {
                dz: 100.0,
                ..SaturationConfig::default()
            },
            ReferenceScales::standard().unwrap(),
            Seconds::new(1.0),
        )
        .unwrap();
        micro.prepare(&state).unwrap();
        (dynamics, micro, state)
    }

    #[test]
    fn test_off_boundary_entry_rejected() {
        let (mut dynamics, mut micro, mut state) = fixtures();
        let scheduler = CoupledStepScheduler::new(CouplingSchedule::new(4).unwrap());
        let mut clock = SimulationClock::new(1.0);
        clock.advance_to(3);

        let err = scheduler
            .advance_coupling_interval(
                &mut state,
                &mut clock,
                &mut dynamics,
                &mut micro,
                &mut NoObserver,
            )
            .unwrap_err();
        assert_eq!(
            err,
            SimulationError::Desynchronization {
                step: 3,
                expected: 4,
            }
        );
    }

    #[test]
    fn test_clock_lands_on_target_exactly() {
        let (mut dynamics, mut micro, mut state) = fixtures();
        let scheduler = CoupledStepScheduler::new(CouplingSchedule::new(1).unwrap());
        let mut clock = SimulationClock::new(1.0);

        for expected in 1..=5 {
            scheduler
                .advance_coupling_interval(
                    &mut state,
                    &mut clock,
                    &mut dynamics,
                    &mut micro,
                    &mut NoObserver,
                )
                .unwrap();
            assert_eq!(clock.step(), expected);
        }
    }

    #[test]
    fn test_stalled_observer_detected() {
        struct Stalled;
        impl ObservationSchedule for Stalled {
            fn next_observation(&mut self, step: u64) -> u64 {
                step // violates the progress contract
            }
        }

        let (mut dynamics, mut micro, mut state) = fixtures();
        let scheduler = CoupledStepScheduler::new(CouplingSchedule::new(2).unwrap());
        let mut clock = SimulationClock::new(1.0);

        let err = scheduler
            .advance_coupling_interval(
                &mut state,
                &mut clock,
                &mut dynamics,
                &mut micro,
                &mut Stalled,
            )
            .unwrap_err();
        assert!(matches!(err, SimulationError::Desynchronization { .. }));
    }

    #[test]
    fn test_periodic_observer_progresses() {
        let mut obs = PeriodicObserver::new(5);
        assert_eq!(obs.next_observation(0), 5);
        assert_eq!(obs.next_observation(4), 5);
        assert_eq!(obs.next_observation(5), 10);
    }

    #[test]
    fn test_merge_takes_earlier_stream() {
        let mut merged = MergeObservers(PeriodicObserver::new(3), PeriodicObserver::new(5));
        assert_eq!(merged.next_observation(0), 3);
        assert_eq!(merged.next_observation(3), 5);
        assert_eq!(merged.next_observation(5), 6);
    }
}
