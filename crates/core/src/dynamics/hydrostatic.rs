//! Steady hydrostatic background profile
//!
//! Solves the first-order ODE `dp/dz = -rho g` once at driver
//! construction, with an ideal-gas closure and a linear temperature lapse,
//! marching upward from the surface with an explicit first-order step per
//! half cell. The resulting profile is steady for the whole run.

/// Dry-air gas constant (J/(kg·K))
pub const R_DRY: f64 = 287.05;
/// Gravitational acceleration (m/s²)
pub const GRAVITY: f64 = 9.81;
/// Floor on the lapse-rate temperature profile (K); keeps the ideal-gas
/// closure away from the singularity for very deep columns
const MIN_TEMPERATURE: f64 = 180.0;

/// Background profile at cell centers
#[derive(Debug, Clone)]
pub struct HydrostaticProfile {
    /// Pressure per cell (Pa)
    pub pressure: Vec<f64>,
    /// Dry-air density per cell (kg/m³)
    pub density: Vec<f64>,
    /// Temperature per cell (K)
    pub temperature: Vec<f64>,
}

/// Integrate hydrostatic balance over a column of `n_cells` cells of
/// spacing `dz`, given surface pressure (Pa), surface temperature (K) and
/// a linear lapse rate (K/m).
#[must_use]
pub fn hydrostatic_balance(
    n_cells: usize,
    dz: f64,
    surface_pressure: f64,
    surface_temperature: f64,
    lapse_rate: f64,
) -> HydrostaticProfile {
    assert!(n_cells > 0 && dz > 0.0, "hydrostatic_balance: empty column");

    let temperature_at = |z: f64| (surface_temperature - lapse_rate * z).max(MIN_TEMPERATURE);

    let mut pressure = Vec::with_capacity(n_cells);
    let mut density = Vec::with_capacity(n_cells);
    let mut temperature = Vec::with_capacity(n_cells);

    // March from the surface to the first cell center, then center to
    // center, evaluating rho = p / (R_d T) at the lower point of each step.
    let mut p = surface_pressure;
    let mut z = 0.0;
    for j in 0..n_cells {
        let z_center = (j as f64 + 0.5) * dz;
        let span = z_center - z;
        let rho_here = p / (R_DRY * temperature_at(z));
        p -= rho_here * GRAVITY * span;
        z = z_center;

        let t = temperature_at(z);
        pressure.push(p);
        temperature.push(t);
        density.push(p / (R_DRY * t));
    }

    HydrostaticProfile {
        pressure,
        density,
        temperature,
    }
}
