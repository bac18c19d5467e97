//! Top-level column simulation driver
//!
//! Owns the shared state, the clock, the two adapters and the output
//! buffer, and repeatedly invokes the coupling scheduler until the end of
//! the run, recording the state after every completed coupling interval.

use crate::core_types::{CouplingSchedule, Seconds, SimulationClock, ThermodynamicState};
use crate::dynamics::DynamicsAdapter;
use crate::error::SimulationError;
use crate::microphysics::MicrophysicsAdapter;
use crate::output::{OutputBuffer, OutputRecord};
use crate::scheduler::{
    CoupledStepScheduler, MergeObservers, ObservationSchedule, PeriodicObserver,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Run parameters consumed by the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Fixed scale factor between model steps and real time
    pub steps_per_second: f64,
    /// End of the simulated interval
    pub t_end: Seconds,
    /// Coupling interval in model steps
    pub coupling_interval: u64,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            steps_per_second: 1.0,
            t_end: Seconds::new(3600.0),
            coupling_interval: 1,
        }
    }
}

/// A fully wired coupled column run
pub struct ColumnSimulation {
    state: ThermodynamicState,
    clock: SimulationClock,
    scheduler: CoupledStepScheduler,
    dynamics: Box<dyn DynamicsAdapter>,
    microphysics: Box<dyn MicrophysicsAdapter>,
    // The user stream merged with a checkpoint at every dynamics step, so
    // each merged sub-interval spans exactly one fixed dynamics step
    observer: MergeObservers<Box<dyn ObservationSchedule>, PeriodicObserver>,
    buffer: OutputBuffer,
    t_end_steps: u64,
}

impl std::fmt::Debug for ColumnSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSimulation")
            .field("state", &self.state)
            .field("clock", &self.clock)
            .field("scheduler", &self.scheduler)
            .field("buffer", &self.buffer)
            .field("t_end_steps", &self.t_end_steps)
            .finish_non_exhaustive()
    }
}

impl ColumnSimulation {
    /// Wire a run: validates the schedule against the dynamics step,
    /// prepares the microphysics, performs the initial receive and
    /// records the initial state.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] when the end time or coupling
    /// interval cannot produce a valid run; preparation errors from the
    /// adapters are propagated.
    pub fn new(
        config: &ColumnConfig,
        mut state: ThermodynamicState,
        dynamics: Box<dyn DynamicsAdapter>,
        mut microphysics: Box<dyn MicrophysicsAdapter>,
        observer: Box<dyn ObservationSchedule>,
    ) -> Result<Self, SimulationError> {
        let clock = SimulationClock::new(config.steps_per_second);
        let schedule = CouplingSchedule::new(config.coupling_interval)?;
        let t_end_steps = clock.steps_from_seconds(config.t_end);

        if t_end_steps == 0 || t_end_steps % schedule.interval() != 0 {
            return Err(SimulationError::InvalidConfig(format!(
                "end time of {t_end_steps} steps is not a positive multiple of the coupling interval {}",
                schedule.interval()
            )));
        }
        let step_len = dynamics.step_len();
        if schedule.interval() % step_len != 0 {
            return Err(SimulationError::InvalidConfig(format!(
                "coupling interval {} is not a multiple of the dynamics step {step_len}",
                schedule.interval()
            )));
        }

        microphysics.prepare(&state)?;
        dynamics.receive(&mut state)?;

        let slots = OutputBuffer::slots_for(t_end_steps, schedule.interval());
        let mut buffer = OutputBuffer::new(slots, &state);
        buffer.record(0, &state)?;

        info!(
            n_cells = state.n_cells(),
            t_end_steps,
            coupling_interval = schedule.interval(),
            dynamics_step = step_len,
            microphysics = microphysics.name(),
            "column simulation wired"
        );

        Ok(Self {
            state,
            clock,
            scheduler: CoupledStepScheduler::new(schedule),
            dynamics,
            microphysics,
            observer: MergeObservers(observer, PeriodicObserver::new(step_len)),
            buffer,
            t_end_steps,
        })
    }

    /// Shared state as of the last completed coupling interval.
    #[must_use]
    pub fn state(&self) -> &ThermodynamicState {
        &self.state
    }

    /// Current model step.
    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.clock.step()
    }

    /// Elapsed simulated time.
    #[must_use]
    pub fn elapsed(&self) -> Seconds {
        self.clock.elapsed()
    }

    /// Advance exactly one coupling interval and record the state.
    ///
    /// # Errors
    ///
    /// Scheduler and recording errors are propagated; all are fatal.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        self.scheduler.advance_coupling_interval(
            &mut self.state,
            &mut self.clock,
            self.dynamics.as_mut(),
            self.microphysics.as_mut(),
            &mut self.observer,
        )?;
        self.buffer.record(self.clock.step(), &self.state)?;
        debug!(step = self.clock.step(), "coupling interval recorded");
        Ok(())
    }

    /// Run to the end of the simulated interval and finalize the output.
    ///
    /// # Errors
    ///
    /// The first scheduler, adapter or recording error aborts the run.
    pub fn run(mut self) -> Result<OutputRecord, SimulationError> {
        while self.clock.step() < self.t_end_steps {
            self.step()?;
        }
        self.microphysics.finalize();
        info!(
            records = self.buffer.len(),
            final_step = self.clock.step(),
            "column run complete"
        );
        Ok(self.buffer.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{KinematicConfig, KinematicDriver};
    use crate::microphysics::{SaturationAdjustment, SaturationConfig};
    use crate::scheduler::NoObserver;
    use crate::ReferenceScales;

    fn wired(t_end: f64, coupling: u64) -> Result<ColumnSimulation, SimulationError> {
        let config = ColumnConfig {
            steps_per_second: 1.0,
            t_end: Seconds::new(t_end),
            coupling_interval: coupling,
        };
        let dynamics = KinematicDriver::new(
            KinematicConfig {
                n_cells: 20,
                dz: 150.0,
                step_len: 1,
                ..KinematicConfig::default()
            },
            Seconds::new(1.0),
        )?;
        let state = dynamics.initial_state()?;
        let micro = SaturationAdjustment::new(
            SaturationConfig {
                dz: 150.0,
                ..SaturationConfig::default()
            },
            ReferenceScales::standard()?,
            Seconds::new(1.0),
        )?;
        ColumnSimulation::new(
            &config,
            state,
            Box::new(dynamics),
            Box::new(micro),
            Box::new(NoObserver),
        )
    }

    #[test]
    fn test_run_records_one_row_per_interval_plus_initial() {
        let record = wired(10.0, 2).unwrap().run().unwrap();
        assert_eq!(record.steps(), &[0, 2, 4, 6, 8, 10]);
        assert_eq!(record.field("vapour").unwrap().rows().count(), 6);
    }

    #[test]
    fn test_end_time_must_align_with_coupling() {
        let err = wired(10.0, 3).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
    }

    #[test]
    fn test_coupling_must_align_with_dynamics_step() {
        let config = ColumnConfig {
            steps_per_second: 1.0,
            t_end: Seconds::new(12.0),
            coupling_interval: 3,
        };
        let dynamics = KinematicDriver::new(
            KinematicConfig {
                n_cells: 10,
                dz: 200.0,
                step_len: 2,
                ..KinematicConfig::default()
            },
            Seconds::new(1.0),
        )
        .unwrap();
        let state = dynamics.initial_state().unwrap();
        let micro = SaturationAdjustment::new(
            SaturationConfig {
                dz: 200.0,
                ..SaturationConfig::default()
            },
            ReferenceScales::standard().unwrap(),
            Seconds::new(1.0),
        )
        .unwrap();
        let err = ColumnSimulation::new(
            &config,
            state,
            Box::new(dynamics),
            Box::new(micro),
            Box::new(NoObserver),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
    }

    #[test]
    fn test_stepwise_clock_progress() {
        let mut sim = wired(6.0, 2).unwrap();
        assert_eq!(sim.current_step(), 0);
        sim.step().unwrap();
        assert_eq!(sim.current_step(), 2);
        assert_eq!(*sim.elapsed(), 2.0);
    }
}
