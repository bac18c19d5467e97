//! Microphysics adapter interface and the concrete schemes
//!
//! The scheduler drives an opaque particle or bulk process through the
//! four-operation [`MicrophysicsAdapter`] surface. Unlike the dynamics
//! adapter, the interval handed to `run_step` is a ceiling, not a fixed
//! step: a scheme is free to sub-step `[t_start, t_stop)` as finely as its
//! own stability demands.
//!
//! Units contract: the shared state crosses this boundary in the
//! simulation's dimensional convention. A scheme converts to its internal
//! convention with [`crate::ReferenceScales::to_internal`] on entry and
//! must restore the external convention with `to_external` before
//! returning.

pub mod particle;
pub mod saturation;

use crate::core_types::ThermodynamicState;
use crate::error::SimulationError;

pub use particle::{ParticleConfig, ParticleEnsemble};
pub use saturation::{SaturationAdjustment, SaturationConfig};

/// Latent heat of vapourization (J/kg)
pub(crate) const LATENT_HEAT: f64 = 2.5e6;
/// Specific heat of dry air at constant pressure (J/(kg·K))
pub(crate) const CP_DRY: f64 = 1005.0;
/// Gas constant of water vapour (J/(kg·K))
pub(crate) const R_VAPOUR: f64 = 461.5;
/// Ratio of gas constants `R_d / R_v`
pub(crate) const EPSILON: f64 = 0.622;

/// Saturation vapour pressure over liquid water (Pa)
///
/// Magnus form (Alduchov & Eskridge 1996), valid for tropospheric
/// temperatures.
#[must_use]
pub(crate) fn saturation_vapour_pressure(temperature_k: f64) -> f64 {
    let t_c = temperature_k - 273.15;
    611.2 * (17.62 * t_c / (243.12 + t_c)).exp()
}

/// Saturation water-vapour mass fraction at the given temperature and
/// pressure.
#[must_use]
pub(crate) fn saturation_mass_fraction(temperature_k: f64, pressure_pa: f64) -> f64 {
    let es = saturation_vapour_pressure(temperature_k);
    EPSILON * es / (pressure_pa - es).max(es)
}

/// Contract the scheduler uses to drive a microphysics scheme
pub trait MicrophysicsAdapter {
    /// Scheme name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// One-time setup before the run begins: allocate the particle
    /// population, compute derived constants.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] if the scheme cannot operate on
    /// the given column.
    fn prepare(&mut self, state: &ThermodynamicState) -> Result<(), SimulationError>;

    /// Bookkeeping hook called before every sub-interval. Must not mutate
    /// the shared state.
    fn at_start_step(&mut self, step: u64, state: &ThermodynamicState);

    /// Perform the microphysical process for `[t_start, t_stop)`, mutating
    /// the mass-fraction fields and any diagnostics the scheme computes.
    ///
    /// # Errors
    ///
    /// [`SimulationError::ShapeMismatch`] if `state` does not match the
    /// column the scheme was prepared for.
    fn run_step(
        &mut self,
        t_start: u64,
        t_stop: u64,
        state: &mut ThermodynamicState,
    ) -> Result<(), SimulationError>;

    /// Release per-run resources after the final coupling interval.
    fn finalize(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_saturation_pressure_reference_points() {
        // 611 Pa at the triple point, ~2.3 kPa at 20 °C
        assert_relative_eq!(saturation_vapour_pressure(273.15), 611.2, max_relative = 1e-3);
        let e20 = saturation_vapour_pressure(293.15);
        assert!(
            (2200.0..2450.0).contains(&e20),
            "es(20°C) should be ~2.3 kPa, got {e20}"
        );
    }

    #[test]
    fn test_saturation_mass_fraction_increases_with_temperature() {
        let cold = saturation_mass_fraction(280.0, 90_000.0);
        let warm = saturation_mass_fraction(300.0, 90_000.0);
        assert!(warm > cold, "qsat must grow with temperature");
        assert!(
            (0.001..0.1).contains(&warm),
            "qsat should be a few percent at most, got {warm}"
        );
    }
}
