//! Shared thermodynamic state of the column
//!
//! [`ThermodynamicState`] is the single buffer both subsystems exchange
//! through. It is created exactly once by the driver before the run
//! begins; adapters receive a short-lived mutable view at well-defined
//! points and must not hold on to it. Fields are only ever overwritten in
//! place, never reallocated to a different length during a run.

use crate::error::SimulationError;
use serde::{Deserialize, Serialize};

/// Per-cell scalar field names, in recording order.
pub const SCALAR_FIELDS: [&str; 7] = [
    "pressure",
    "temperature",
    "density",
    "vapour",
    "cloud_water",
    "rain_water",
    "precip_flux",
];

/// Mass-fraction field names (vapour plus each condensate category).
pub const MASS_FRACTION_FIELDS: [&str; 3] = ["vapour", "cloud_water", "rain_water"];

/// Initial profiles used to construct a [`ThermodynamicState`]
///
/// Velocity profiles default to rest; the vertical component, if given,
/// must be on cell faces (one entry more than the scalar fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateProfiles {
    /// Pressure per cell (Pa)
    pub pressure: Vec<f64>,
    /// Temperature per cell (K)
    pub temperature: Vec<f64>,
    /// Dry-air density per cell (kg/m³)
    pub density: Vec<f64>,
    /// Water-vapour mass fraction per cell (kg/kg)
    pub vapour: Vec<f64>,
    /// Cloud-water mass fraction per cell (kg/kg), zeros if empty
    pub cloud_water: Vec<f64>,
    /// Rain-water mass fraction per cell (kg/kg), zeros if empty
    pub rain_water: Vec<f64>,
    /// Vertical velocity on cell faces (m/s), zeros if empty
    pub velocity_w: Vec<f64>,
}

/// Physical state of the column at one instant
///
/// All scalar fields share the same length (number of grid cells); the
/// vertical velocity lives on cell faces and is one entry longer. The two
/// horizontal components are carried per cell and pass through the column
/// model unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermodynamicState {
    n_cells: usize,
    /// Pressure (Pa)
    pub pressure: Vec<f64>,
    /// Temperature (K)
    pub temperature: Vec<f64>,
    /// Dry-air density (kg/m³)
    pub density: Vec<f64>,
    /// Water-vapour mass fraction (kg/kg)
    pub vapour: Vec<f64>,
    /// Cloud-water mass fraction (kg/kg)
    pub cloud_water: Vec<f64>,
    /// Rain-water mass fraction (kg/kg)
    pub rain_water: Vec<f64>,
    /// Precipitation flux diagnostic (kg/m²/s), written by microphysics
    pub precip_flux: Vec<f64>,
    /// Vertical velocity on cell faces (m/s), length `n_cells + 1`
    pub velocity_w: Vec<f64>,
    /// Zonal velocity per cell (m/s)
    pub velocity_u: Vec<f64>,
    /// Meridional velocity per cell (m/s)
    pub velocity_v: Vec<f64>,
}

impl ThermodynamicState {
    /// Build a state from initial profiles, validating every length.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] for an empty column;
    /// [`SimulationError::ShapeMismatch`] naming the first field whose
    /// length disagrees with the pressure profile.
    pub fn new(profiles: StateProfiles) -> Result<Self, SimulationError> {
        let n_cells = profiles.pressure.len();
        if n_cells == 0 {
            return Err(SimulationError::InvalidConfig(
                "column must have at least one grid cell".to_string(),
            ));
        }

        let or_zeros = |v: Vec<f64>, len: usize| if v.is_empty() { vec![0.0; len] } else { v };
        let check = |name: &'static str, v: &[f64], expected: usize| {
            if v.len() == expected {
                Ok(())
            } else {
                Err(SimulationError::ShapeMismatch {
                    field: name,
                    expected,
                    actual: v.len(),
                })
            }
        };

        let cloud_water = or_zeros(profiles.cloud_water, n_cells);
        let rain_water = or_zeros(profiles.rain_water, n_cells);
        let velocity_w = or_zeros(profiles.velocity_w, n_cells + 1);

        check("temperature", &profiles.temperature, n_cells)?;
        check("density", &profiles.density, n_cells)?;
        check("vapour", &profiles.vapour, n_cells)?;
        check("cloud_water", &cloud_water, n_cells)?;
        check("rain_water", &rain_water, n_cells)?;
        check("velocity_w", &velocity_w, n_cells + 1)?;

        Ok(Self {
            n_cells,
            pressure: profiles.pressure,
            temperature: profiles.temperature,
            density: profiles.density,
            vapour: profiles.vapour,
            cloud_water,
            rain_water,
            precip_flux: vec![0.0; n_cells],
            velocity_w,
            velocity_u: vec![0.0; n_cells],
            velocity_v: vec![0.0; n_cells],
        })
    }

    /// Build a resting column with uniform values in every cell.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] for an empty column.
    pub fn uniform(
        n_cells: usize,
        pressure: f64,
        temperature: f64,
        density: f64,
        vapour: f64,
    ) -> Result<Self, SimulationError> {
        Self::new(StateProfiles {
            pressure: vec![pressure; n_cells],
            temperature: vec![temperature; n_cells],
            density: vec![density; n_cells],
            vapour: vec![vapour; n_cells],
            ..StateProfiles::default()
        })
    }

    /// Number of grid cells.
    #[inline]
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Number of cell faces (staggered velocity length).
    #[inline]
    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.n_cells + 1
    }

    /// All recorded fields as `(name, values)` pairs, scalars first, then
    /// the staggered vertical velocity.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, &[f64])> {
        vec![
            ("pressure", self.pressure.as_slice()),
            ("temperature", self.temperature.as_slice()),
            ("density", self.density.as_slice()),
            ("vapour", self.vapour.as_slice()),
            ("cloud_water", self.cloud_water.as_slice()),
            ("rain_water", self.rain_water.as_slice()),
            ("precip_flux", self.precip_flux.as_slice()),
            ("velocity_w", self.velocity_w.as_slice()),
        ]
    }

    /// Overwrite a per-cell scalar field in place.
    ///
    /// # Errors
    ///
    /// [`SimulationError::ShapeMismatch`] if `values` has the wrong length.
    pub fn overwrite(
        &mut self,
        field: &'static str,
        values: &[f64],
    ) -> Result<(), SimulationError> {
        let dst = match field {
            "pressure" => &mut self.pressure,
            "temperature" => &mut self.temperature,
            "density" => &mut self.density,
            "vapour" => &mut self.vapour,
            "cloud_water" => &mut self.cloud_water,
            "rain_water" => &mut self.rain_water,
            "precip_flux" => &mut self.precip_flux,
            "velocity_w" => &mut self.velocity_w,
            other => {
                return Err(SimulationError::InvalidConfig(format!(
                    "unknown field '{other}'"
                )))
            }
        };
        if values.len() != dst.len() {
            return Err(SimulationError::ShapeMismatch {
                field,
                expected: dst.len(),
                actual: values.len(),
            });
        }
        dst.copy_from_slice(values);
        Ok(())
    }
}
