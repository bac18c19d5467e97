//! Unit-conversion layer between the simulation and microphysics conventions
//!
//! The column model works in SI-like dimensional units; the particle
//! microphysics works in its own convention expressed in fixed reference
//! scales. [`ReferenceScales`] is the immutable, run-constant bundle of
//! those scales, applied at the microphysics boundary only. The round-trip
//! `to_external(to_internal(x))` must return the original values up to one
//! multiply/divide pair of floating round-off, for every field
//! independently.
//!
//! Velocity components and mass fractions are dimensionless under the
//! model's convention and pass through unchanged.

use crate::core_types::ThermodynamicState;
use crate::error::SimulationError;
use serde::{Deserialize, Serialize};

/// Strictly positive reference scales fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceScales {
    /// Reference pressure (Pa)
    pub pressure: f64,
    /// Reference temperature (K)
    pub temperature: f64,
    /// Reference density (kg/m³)
    pub density: f64,
    /// Reference precipitation flux (kg/m²/s)
    pub precip_flux: f64,
}

impl ReferenceScales {
    /// Bundle reference scales, validating positivity.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] if any scale is not strictly
    /// positive and finite.
    pub fn new(
        pressure: f64,
        temperature: f64,
        density: f64,
        precip_flux: f64,
    ) -> Result<Self, SimulationError> {
        for (name, value) in [
            ("pressure", pressure),
            ("temperature", temperature),
            ("density", density),
            ("precip_flux", precip_flux),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimulationError::InvalidConfig(format!(
                    "reference scale '{name}' must be strictly positive, got {value}"
                )));
            }
        }
        Ok(Self {
            pressure,
            temperature,
            density,
            precip_flux,
        })
    }

    /// Standard-atmosphere surface values as scales.
    ///
    /// # Errors
    ///
    /// Infallible in practice; shares the validating constructor.
    pub fn standard() -> Result<Self, SimulationError> {
        Self::new(100_000.0, 300.0, 1.0, 1.0e-4)
    }

    /// Scale the dimensional fields into the microphysics-internal
    /// convention (divide by the reference scales).
    pub fn to_internal(&self, state: &mut ThermodynamicState) {
        scale_in_place(&mut state.pressure, 1.0 / self.pressure);
        scale_in_place(&mut state.temperature, 1.0 / self.temperature);
        scale_in_place(&mut state.density, 1.0 / self.density);
        scale_in_place(&mut state.precip_flux, 1.0 / self.precip_flux);
    }

    /// Scale the converted fields back into the simulation's dimensional
    /// convention (multiply by the same reference scales).
    pub fn to_external(&self, state: &mut ThermodynamicState) {
        scale_in_place(&mut state.pressure, self.pressure);
        scale_in_place(&mut state.temperature, self.temperature);
        scale_in_place(&mut state.density, self.density);
        scale_in_place(&mut state.precip_flux, self.precip_flux);
    }
}

fn scale_in_place(field: &mut [f64], factor: f64) {
    for v in &mut *field {
        *v *= factor;
    }
    debug_assert!(
        field.iter().all(|v| v.is_finite()),
        "unit conversion produced a non-finite value"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_state() -> ThermodynamicState {
        ThermodynamicState::uniform(4, 95_000.0, 285.0, 1.1, 0.008).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        assert!(ReferenceScales::new(0.0, 300.0, 1.0, 1.0e-4).is_err());
        assert!(ReferenceScales::new(1.0e5, -5.0, 1.0, 1.0e-4).is_err());
        assert!(ReferenceScales::new(1.0e5, 300.0, f64::NAN, 1.0e-4).is_err());
    }

    #[test]
    fn test_round_trip_restores_fields() {
        let scales = ReferenceScales::new(97_000.0, 290.0, 1.13, 2.5e-4).unwrap();
        let mut state = test_state();
        let original = state.clone();

        scales.to_internal(&mut state);
        scales.to_external(&mut state);

        for (name, values) in state.fields() {
            let before: &[f64] = original
                .fields()
                .iter()
                .find(|(n, _)| *n == name)
                .unwrap()
                .1;
            for (a, b) in values.iter().zip(before) {
                assert_relative_eq!(a, b, max_relative = 1e-14);
            }
        }
    }

    #[test]
    fn test_internal_values_are_scaled() {
        let scales = ReferenceScales::new(100_000.0, 300.0, 1.0, 1.0e-4).unwrap();
        let mut state = test_state();
        scales.to_internal(&mut state);
        assert_relative_eq!(state.pressure[0], 0.95, max_relative = 1e-12);
        assert_relative_eq!(state.temperature[0], 0.95, max_relative = 1e-12);
    }

    #[test]
    fn test_dimensionless_fields_pass_through() {
        let scales = ReferenceScales::standard().unwrap();
        let mut state = test_state();
        state.velocity_w.fill(2.0);
        let vapour_before = state.vapour.clone();

        scales.to_internal(&mut state);
        assert_eq!(state.vapour, vapour_before, "mass fractions must not scale");
        assert!(state.velocity_w.iter().all(|&w| w == 2.0));
    }

    #[test]
    fn test_round_trip_zero_and_negative() {
        // Zero and negative values (e.g. downdraft velocities mapped into a
        // converted diagnostic) must survive the round trip too
        let scales = ReferenceScales::new(3.0, 7.0, 11.0, 13.0).unwrap();
        let mut state = test_state();
        state.precip_flux = vec![0.0, -1.5e-4, 2.5e-4, -0.0];
        let before = state.precip_flux.clone();

        scales.to_internal(&mut state);
        scales.to_external(&mut state);
        for (a, b) in state.precip_flux.iter().zip(&before) {
            assert_relative_eq!(a, b, max_relative = 1e-14, epsilon = 1e-300);
        }
    }
}
