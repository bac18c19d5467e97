//! Bulk saturation-adjustment microphysics
//!
//! All-or-nothing condensation against the local saturation mass
//! fraction with latent-heat feedback, a threshold autoconversion of
//! cloud water to rain, and single-moment rain sedimentation that
//! diagnoses the precipitation flux. Sub-steps the coupling interval
//! finely enough to keep the sedimentation CFL below one.

use super::{
    saturation_mass_fraction, MicrophysicsAdapter, CP_DRY, LATENT_HEAT, R_VAPOUR,
};
use crate::core_types::{Seconds, ThermodynamicState};
use crate::error::SimulationError;
use crate::scales::ReferenceScales;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tunable parameters of the bulk scheme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaturationConfig {
    /// Minimum number of internal sub-steps per coupling sub-interval
    pub min_substeps: u32,
    /// Cloud-water mass fraction above which autoconversion starts (kg/kg)
    pub autoconversion_threshold: f64,
    /// Autoconversion rate constant (1/s)
    pub autoconversion_rate: f64,
    /// Mass-weighted rain fall speed (m/s)
    pub rain_fall_speed: f64,
    /// Cell spacing of the column the scheme runs on (m)
    pub dz: f64,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            min_substeps: 1,
            autoconversion_threshold: 1.0e-3,
            autoconversion_rate: 1.0e-3,
            rain_fall_speed: 5.0,
            dz: 25.0,
        }
    }
}

/// Bulk warm-rain scheme behind the [`MicrophysicsAdapter`] seam
pub struct SaturationAdjustment {
    config: SaturationConfig,
    scales: ReferenceScales,
    step_seconds: f64,
    n_cells: usize,
    steps_seen: u64,
}

impl SaturationAdjustment {
    /// Create the scheme.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] for non-positive spacing, fall
    /// speed or sub-step count.
    pub fn new(
        config: SaturationConfig,
        scales: ReferenceScales,
        step_duration: Seconds,
    ) -> Result<Self, SimulationError> {
        if config.dz <= 0.0 || config.rain_fall_speed <= 0.0 || config.min_substeps == 0 {
            return Err(SimulationError::InvalidConfig(
                "saturation scheme needs positive dz, fall speed and sub-step count".to_string(),
            ));
        }
        Ok(Self {
            config,
            scales,
            step_seconds: *step_duration,
            n_cells: 0,
            steps_seen: 0,
        })
    }

    fn check_prepared(&self, state: &ThermodynamicState) -> Result<(), SimulationError> {
        if self.n_cells == state.n_cells() {
            Ok(())
        } else {
            Err(SimulationError::ShapeMismatch {
                field: "temperature",
                expected: self.n_cells,
                actual: state.n_cells(),
            })
        }
    }

    /// One internal sub-step over the whole column, operating on the
    /// state in the scheme's internal (scaled) convention.
    fn substep(&self, state: &mut ThermodynamicState, dt: f64) {
        let n = self.n_cells;
        for j in 0..n {
            // Redimensionalize the scaled thermodynamic fields for the
            // saturation formulae
            let t_k = state.temperature[j] * self.scales.temperature;
            let p_pa = state.pressure[j] * self.scales.pressure;
            let qsat = saturation_mass_fraction(t_k, p_pa);

            // Saturation adjustment with first-order latent-heat feedback
            let feedback = 1.0 + LATENT_HEAT * LATENT_HEAT * qsat / (CP_DRY * R_VAPOUR * t_k * t_k);
            let excess = (state.vapour[j] - qsat) / feedback;
            let dq = if excess >= 0.0 {
                excess
            } else {
                // Evaporate no more cloud water than exists
                excess.max(-state.cloud_water[j])
            };
            state.vapour[j] -= dq;
            state.cloud_water[j] += dq;
            state.temperature[j] += LATENT_HEAT / CP_DRY * dq / self.scales.temperature;

            // Threshold autoconversion of cloud to rain
            let surplus = state.cloud_water[j] - self.config.autoconversion_threshold;
            if surplus > 0.0 {
                let dqr = (self.config.autoconversion_rate * surplus * dt).min(surplus);
                state.cloud_water[j] -= dqr;
                state.rain_water[j] += dqr;
            }
        }

        // Rain sedimentation: upwind from above at a fixed fall speed,
        // no rain entering through the column top
        let courant = self.config.rain_fall_speed * dt / self.config.dz;
        debug_assert!(courant <= 1.0, "sedimentation CFL exceeded");
        let old_rain = state.rain_water.clone();
        for j in 0..n {
            let from_above = if j + 1 < n { old_rain[j + 1] } else { 0.0 };
            state.rain_water[j] += courant * (from_above - old_rain[j]);
        }

        // Precipitation flux diagnostic per cell (scaled convention)
        for j in 0..n {
            let rho = state.density[j] * self.scales.density;
            state.precip_flux[j] =
                rho * old_rain[j] * self.config.rain_fall_speed / self.scales.precip_flux;
        }
    }
}

impl MicrophysicsAdapter for SaturationAdjustment {
    fn name(&self) -> &'static str {
        "saturation-adjustment"
    }

    fn prepare(&mut self, state: &ThermodynamicState) -> Result<(), SimulationError> {
        self.n_cells = state.n_cells();
        info!(
            scheme = self.name(),
            n_cells = self.n_cells,
            "microphysics prepared"
        );
        Ok(())
    }

    fn at_start_step(&mut self, step: u64, _state: &ThermodynamicState) {
        self.steps_seen += 1;
        debug!(step, scheme = self.name(), "microphysics step start");
    }

    fn run_step(
        &mut self,
        t_start: u64,
        t_stop: u64,
        state: &mut ThermodynamicState,
    ) -> Result<(), SimulationError> {
        self.check_prepared(state)?;
        let dt_total = (t_stop - t_start) as f64 * self.step_seconds;
        if dt_total <= 0.0 {
            return Ok(());
        }

        // The interval is a ceiling: sub-step at least min_substeps times,
        // and finer if sedimentation stability demands it
        let cfl_substeps =
            (dt_total * self.config.rain_fall_speed / self.config.dz).ceil() as u32;
        let substeps = self.config.min_substeps.max(cfl_substeps).max(1);
        let dt = dt_total / f64::from(substeps);

        self.scales.to_internal(state);
        for _ in 0..substeps {
            self.substep(state, dt);
        }
        self.scales.to_external(state);
        Ok(())
    }

    fn finalize(&mut self) {
        info!(
            scheme = self.name(),
            steps = self.steps_seen,
            "microphysics finalized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scheme(dz: f64) -> SaturationAdjustment {
        SaturationAdjustment::new(
            SaturationConfig {
                dz,
                ..SaturationConfig::default()
            },
            ReferenceScales::standard().unwrap(),
            Seconds::new(1.0),
        )
        .unwrap()
    }

    fn saturated_state() -> ThermodynamicState {
        // 290 K at 95 kPa holds ~13 g/kg; 20 g/kg is well supersaturated
        ThermodynamicState::uniform(8, 95_000.0, 290.0, 1.14, 0.020).unwrap()
    }

    #[test]
    fn test_supersaturation_condenses_and_warms() {
        let mut micro = scheme(25.0);
        let mut state = saturated_state();
        micro.prepare(&state).unwrap();
        let t_before = state.temperature[3];
        let qv_before = state.vapour[3];

        micro.run_step(0, 5, &mut state).unwrap();

        assert!(state.vapour[3] < qv_before, "vapour must condense");
        assert!(state.cloud_water[3] > 0.0, "cloud water must appear");
        assert!(
            state.temperature[3] > t_before,
            "latent heating must warm the cell"
        );
    }

    #[test]
    fn test_subsaturated_cloud_evaporates() {
        let mut micro = scheme(25.0);
        // Warm and dry: any cloud water must evaporate, never overshoot
        let mut state = ThermodynamicState::uniform(4, 95_000.0, 300.0, 1.1, 0.001).unwrap();
        state.cloud_water.fill(5.0e-4);
        micro.prepare(&state).unwrap();

        micro.run_step(0, 2, &mut state).unwrap();
        for j in 0..4 {
            assert!(
                state.cloud_water[j] >= 0.0,
                "evaporation must not produce negative cloud water"
            );
            assert!(state.cloud_water[j] < 5.0e-4, "cloud water must shrink");
        }
    }

    #[test]
    fn test_total_water_conserved_without_sedimentation_loss() {
        let mut micro = scheme(25.0);
        let mut state = saturated_state();
        micro.prepare(&state).unwrap();
        // Condensation and autoconversion only move water between
        // categories; only surface fallout removes it
        let total = |s: &ThermodynamicState| -> f64 {
            s.vapour.iter().sum::<f64>()
                + s.cloud_water.iter().sum::<f64>()
                + s.rain_water.iter().sum::<f64>()
        };
        let before = total(&state);
        micro.run_step(0, 1, &mut state).unwrap();
        let after = total(&state);
        assert!(
            after <= before + 1e-12,
            "water cannot be created: {before} -> {after}"
        );
    }

    #[test]
    fn test_state_returned_in_external_convention() {
        let mut micro = scheme(25.0);
        let mut state = saturated_state();
        micro.prepare(&state).unwrap();
        micro.run_step(0, 5, &mut state).unwrap();
        // Dimensional magnitudes, not scaled ones
        assert!(
            state.pressure[0] > 50_000.0,
            "pressure must come back dimensional, got {}",
            state.pressure[0]
        );
        assert!(state.temperature[0] > 200.0);
    }

    #[test]
    fn test_precipitation_flux_diagnosed() {
        let mut micro = scheme(25.0);
        let mut state = saturated_state();
        state.rain_water.fill(1.0e-3);
        micro.prepare(&state).unwrap();
        micro.run_step(0, 1, &mut state).unwrap();
        assert!(
            state.precip_flux[0] > 0.0,
            "falling rain must produce a surface precipitation flux"
        );
    }

    #[test]
    fn test_shape_mismatch_after_prepare() {
        let mut micro = scheme(25.0);
        let state = saturated_state();
        micro.prepare(&state).unwrap();
        let mut other = ThermodynamicState::uniform(5, 95_000.0, 290.0, 1.1, 0.01).unwrap();
        let err = micro.run_step(0, 1, &mut other).unwrap_err();
        assert!(matches!(err, SimulationError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_zero_interval_is_a_no_op() {
        let mut micro = scheme(25.0);
        let mut state = saturated_state();
        micro.prepare(&state).unwrap();
        let before = state.clone();
        micro.run_step(7, 7, &mut state).unwrap();
        assert_relative_eq!(
            state.vapour[0],
            before.vapour[0],
            max_relative = 1e-15
        );
    }
}
