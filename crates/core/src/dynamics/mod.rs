//! Fluid-transport ("dynamics") adapter interface and reference driver
//!
//! The scheduler drives dynamics through the narrow [`DynamicsAdapter`]
//! seam. An adapter may keep a private representation of the fields it
//! owns; that representation is synchronized with the shared
//! [`ThermodynamicState`] only at the scheduler's explicit receive/send
//! points. Inside a coupling interval the shared state is the live buffer
//! that transport and microphysics update in turn.
//!
//! [`KinematicDriver`] is the reference implementation: a prescribed
//! sinusoidal vertical-velocity forcing over a steady hydrostatic
//! background, advecting the water species with a donor-cell upwind
//! update. Whether prescribed-profile behavior is the permanent contract
//! of a dynamics adapter is deliberately not part of the trait; a
//! momentum-solving adapter can implement the same seam.

pub mod advection;
pub mod hydrostatic;

use crate::core_types::{Seconds, ThermodynamicState};
use crate::error::SimulationError;
use advection::donor_cell_step;
use hydrostatic::{hydrostatic_balance, HydrostaticProfile};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Dry adiabatic lapse rate g/cp (K/m)
const DRY_ADIABATIC_LAPSE: f64 = 9.81 / 1005.0;

/// Narrow contract the scheduler uses to drive the continuum solver
pub trait DynamicsAdapter {
    /// Fixed internal step length in model steps. The coupling interval
    /// must be an integer multiple of this.
    fn step_len(&self) -> u64;

    /// Transfer authoritative field values from the adapter's internal
    /// representation into `state` (the "receive" direction).
    ///
    /// # Errors
    ///
    /// [`SimulationError::ShapeMismatch`] if `state` was not built for
    /// this adapter's grid.
    fn receive(&self, state: &mut ThermodynamicState) -> Result<(), SimulationError>;

    /// Integrate exactly one internal step covering `[t_start, t_stop)`
    /// and write the resulting profiles into `state`.
    ///
    /// # Errors
    ///
    /// [`SimulationError::StepMismatch`] if `t_stop - t_start` differs
    /// from [`Self::step_len`]; raised before any state mutation.
    fn advance(
        &mut self,
        t_start: u64,
        t_stop: u64,
        state: &mut ThermodynamicState,
    ) -> Result<(), SimulationError>;

    /// Transfer updated quantities from `state` back into the adapter's
    /// internal representation (the "send" direction).
    ///
    /// # Errors
    ///
    /// [`SimulationError::ShapeMismatch`] if `state` was not built for
    /// this adapter's grid.
    fn send(&mut self, state: &ThermodynamicState) -> Result<(), SimulationError>;
}

/// Configuration for the reference kinematic driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinematicConfig {
    /// Number of grid cells in the column
    pub n_cells: usize,
    /// Cell spacing (m)
    pub dz: f64,
    /// Peak updraft speed of the sinusoidal forcing (m/s)
    pub w_max: f64,
    /// Period of the sinusoidal forcing (s)
    pub forcing_period: f64,
    /// Surface pressure (Pa)
    pub surface_pressure: f64,
    /// Surface temperature (K)
    pub surface_temperature: f64,
    /// Linear temperature lapse rate (K/m)
    pub lapse_rate: f64,
    /// Surface water-vapour mass fraction (kg/kg)
    pub surface_vapour: f64,
    /// e-folding height of the initial vapour profile (m)
    pub vapour_scale_height: f64,
    /// Fixed internal step in model steps
    pub step_len: u64,
}

impl Default for KinematicConfig {
    /// Single-peak updraft over a 3 km column, comparable to the classic
    /// warm-rain column test cases.
    fn default() -> Self {
        Self {
            n_cells: 120,
            dz: 25.0,
            w_max: 2.0,
            forcing_period: 600.0,
            surface_pressure: 100_000.0,
            surface_temperature: 297.9,
            lapse_rate: 0.0065,
            surface_vapour: 0.015,
            vapour_scale_height: 2000.0,
            step_len: 1,
        }
    }
}

/// Reference dynamics: prescribed kinematic forcing over a steady
/// hydrostatic background
#[derive(Debug)]
pub struct KinematicDriver {
    config: KinematicConfig,
    /// Seconds per model step (run constant)
    step_seconds: f64,
    background: HydrostaticProfile,
    // Accepted copy of the water species and face velocities, exchanged
    // with the shared state at receive/send
    vapour: Vec<f64>,
    cloud_water: Vec<f64>,
    rain_water: Vec<f64>,
    face_velocity: Vec<f64>,
}

impl KinematicDriver {
    /// Build the driver: solves the hydrostatic background once and
    /// initializes the advected vapour profile.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] for a degenerate grid, forcing
    /// or step length.
    pub fn new(config: KinematicConfig, step_duration: Seconds) -> Result<Self, SimulationError> {
        if config.n_cells == 0 || config.dz <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "kinematic driver needs a non-empty column with positive spacing".to_string(),
            ));
        }
        if config.forcing_period <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "forcing period must be positive".to_string(),
            ));
        }
        if config.step_len == 0 {
            return Err(SimulationError::InvalidConfig(
                "dynamics step length must be positive".to_string(),
            ));
        }
        let cfl = config.w_max.abs() * *step_duration * config.step_len as f64 / config.dz;
        if cfl > 1.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "kinematic forcing violates CFL: |w_max| dt/dz = {cfl:.3} > 1"
            )));
        }

        let background = hydrostatic_balance(
            config.n_cells,
            config.dz,
            config.surface_pressure,
            config.surface_temperature,
            config.lapse_rate,
        );

        let vapour = (0..config.n_cells)
            .map(|j| {
                let z = (j as f64 + 0.5) * config.dz;
                config.surface_vapour * (-z / config.vapour_scale_height).exp()
            })
            .collect();

        let n = config.n_cells;
        Ok(Self {
            config,
            step_seconds: *step_duration,
            background,
            vapour,
            cloud_water: vec![0.0; n],
            rain_water: vec![0.0; n],
            face_velocity: vec![0.0; n + 1],
        })
    }

    /// Build the starting [`ThermodynamicState`] for this driver's grid.
    ///
    /// # Errors
    ///
    /// Propagates state-construction validation failures.
    pub fn initial_state(&self) -> Result<ThermodynamicState, SimulationError> {
        ThermodynamicState::new(crate::core_types::StateProfiles {
            pressure: self.background.pressure.clone(),
            temperature: self.background.temperature.clone(),
            density: self.background.density.clone(),
            vapour: self.vapour.clone(),
            cloud_water: self.cloud_water.clone(),
            rain_water: self.rain_water.clone(),
            velocity_w: vec![0.0; self.config.n_cells + 1],
        })
    }

    /// Column depth (m).
    fn depth(&self) -> f64 {
        self.config.n_cells as f64 * self.config.dz
    }

    /// Forcing amplitude w(t) of the prescribed updraft.
    fn amplitude(&self, t: f64) -> f64 {
        self.config.w_max * (2.0 * PI * t / self.config.forcing_period).sin()
    }

    /// Net vertical displacement of the forcing since t = 0.
    fn displacement(&self, t: f64) -> f64 {
        let omega = 2.0 * PI / self.config.forcing_period;
        self.config.w_max / omega * (1.0 - (omega * t).cos())
    }

    /// Vertical shape function, zero at the bottom and top of the column.
    fn shape(&self, z: f64) -> f64 {
        (PI * z / self.depth()).sin()
    }

    fn check_shape(&self, len: usize, field: &'static str) -> Result<(), SimulationError> {
        if len == self.config.n_cells {
            Ok(())
        } else {
            Err(SimulationError::ShapeMismatch {
                field,
                expected: self.config.n_cells,
                actual: len,
            })
        }
    }
}

impl DynamicsAdapter for KinematicDriver {
    fn step_len(&self) -> u64 {
        self.config.step_len
    }

    fn receive(&self, state: &mut ThermodynamicState) -> Result<(), SimulationError> {
        state.overwrite("vapour", &self.vapour)?;
        state.overwrite("cloud_water", &self.cloud_water)?;
        state.overwrite("rain_water", &self.rain_water)?;
        state.overwrite("velocity_w", &self.face_velocity)?;
        Ok(())
    }

    fn advance(
        &mut self,
        t_start: u64,
        t_stop: u64,
        state: &mut ThermodynamicState,
    ) -> Result<(), SimulationError> {
        let span = t_stop.saturating_sub(t_start);
        if span != self.config.step_len {
            return Err(SimulationError::StepMismatch {
                adapter: "kinematic-driver",
                requested: span,
                fixed: self.config.step_len,
            });
        }
        self.check_shape(state.n_cells(), "temperature")?;

        let dt = span as f64 * self.step_seconds;
        let t0 = t_start as f64 * self.step_seconds;
        let t_mid = t0 + 0.5 * dt;
        let t_end = t0 + dt;

        // Mid-step face velocities drive the advection update of the
        // shared profiles; the bottom and top faces are closed
        let n = self.config.n_cells;
        let amp_mid = self.amplitude(t_mid);
        self.face_velocity[0] = 0.0;
        self.face_velocity[n] = 0.0;
        for j in 1..n {
            self.face_velocity[j] = amp_mid * self.shape(j as f64 * self.config.dz);
        }
        donor_cell_step(&mut state.vapour, &self.face_velocity, dt, self.config.dz);
        donor_cell_step(&mut state.cloud_water, &self.face_velocity, dt, self.config.dz);
        donor_cell_step(&mut state.rain_water, &self.face_velocity, dt, self.config.dz);

        // Prescribed end-of-step profiles: steady background plus the
        // adiabatic cooling of the net parcel displacement
        let lift = self.displacement(t_end);
        for j in 0..n {
            let z_center = (j as f64 + 0.5) * self.config.dz;
            state.temperature[j] =
                self.background.temperature[j] - DRY_ADIABATIC_LAPSE * lift * self.shape(z_center);
        }
        state.pressure.copy_from_slice(&self.background.pressure);
        state.density.copy_from_slice(&self.background.density);

        let amp_end = self.amplitude(t_end);
        state.velocity_w[0] = 0.0;
        state.velocity_w[n] = 0.0;
        for j in 1..n {
            state.velocity_w[j] = amp_end * self.shape(j as f64 * self.config.dz);
        }
        self.face_velocity.copy_from_slice(&state.velocity_w);
        Ok(())
    }

    fn send(&mut self, state: &ThermodynamicState) -> Result<(), SimulationError> {
        self.check_shape(state.vapour.len(), "vapour")?;
        self.vapour.copy_from_slice(&state.vapour);
        self.cloud_water.copy_from_slice(&state.cloud_water);
        self.rain_water.copy_from_slice(&state.rain_water);
        Ok(())
    }
}
