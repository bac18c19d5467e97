//! Super-particle condensation microphysics
//!
//! A fixed population of super-particles per cell, each standing in for
//! `multiplicity` real droplets of a common radius. Radii are sampled
//! from a lognormal at `prepare`; `run_step` grows or shrinks every
//! particle by diffusional condensation against the local saturation
//! ratio, sub-stepping the coupling interval, then projects the third
//! radius moment back onto the cloud-water mass fraction.

use super::{
    saturation_mass_fraction, MicrophysicsAdapter, CP_DRY, LATENT_HEAT,
};
use crate::core_types::{Seconds, ThermodynamicState};
use crate::error::SimulationError;
use crate::scales::ReferenceScales;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Density of liquid water (kg/m³)
const WATER_DENSITY: f64 = 1000.0;
/// Diffusional growth coefficient in r dr/dt = G S (m²/s)
const GROWTH_COEFF: f64 = 1.0e-10;
/// Smallest radius a particle may shrink to (m); stands in for the dry
/// aerosol core
const MIN_RADIUS: f64 = 1.0e-7;

/// Configuration of the super-particle population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// Super-particles per grid cell
    pub particles_per_cell: usize,
    /// Geometric mean radius of the initial lognormal (m)
    pub mean_radius: f64,
    /// Geometric standard deviation of the initial lognormal
    pub geometric_sigma: f64,
    /// Droplet number concentration represented per kilogram of air (1/kg)
    pub number_per_kg: f64,
    /// Internal sub-steps per coupling sub-interval
    pub substeps: u32,
    /// RNG seed for the initial radius sample
    pub seed: u64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            particles_per_cell: 64,
            mean_radius: 1.0e-6,
            geometric_sigma: 1.4,
            number_per_kg: 1.0e8,
            substeps: 4,
            seed: 44,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SuperParticle {
    /// Droplet radius (m)
    radius: f64,
    /// Real droplets represented, per kilogram of air
    multiplicity: f64,
}

/// Discrete-particle condensation scheme behind the
/// [`MicrophysicsAdapter`] seam
pub struct ParticleEnsemble {
    config: ParticleConfig,
    scales: ReferenceScales,
    step_seconds: f64,
    cells: Vec<Vec<SuperParticle>>,
    steps_seen: u64,
}

impl ParticleEnsemble {
    /// Create the scheme. The population itself is allocated in
    /// [`MicrophysicsAdapter::prepare`].
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] for a degenerate population.
    pub fn new(
        config: ParticleConfig,
        scales: ReferenceScales,
        step_duration: Seconds,
    ) -> Result<Self, SimulationError> {
        if config.particles_per_cell == 0 || config.substeps == 0 {
            return Err(SimulationError::InvalidConfig(
                "particle ensemble needs particles and sub-steps".to_string(),
            ));
        }
        if config.mean_radius <= 0.0 || config.geometric_sigma < 1.0 {
            return Err(SimulationError::InvalidConfig(
                "lognormal radius parameters out of range".to_string(),
            ));
        }
        Ok(Self {
            config,
            scales,
            step_seconds: *step_duration,
            cells: Vec::new(),
            steps_seen: 0,
        })
    }

    /// Liquid water mass fraction held by one cell's population (kg/kg).
    fn liquid_mass(particles: &[SuperParticle]) -> f64 {
        particles
            .iter()
            .map(|p| p.multiplicity * 4.0 / 3.0 * PI * WATER_DENSITY * p.radius.powi(3))
            .sum()
    }

    fn check_prepared(&self, state: &ThermodynamicState) -> Result<(), SimulationError> {
        if self.cells.len() == state.n_cells() {
            Ok(())
        } else {
            Err(SimulationError::ShapeMismatch {
                field: "cloud_water",
                expected: self.cells.len(),
                actual: state.n_cells(),
            })
        }
    }
}

/// Standard normal sample via Box-Muller.
fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl MicrophysicsAdapter for ParticleEnsemble {
    fn name(&self) -> &'static str {
        "particle-ensemble"
    }

    fn prepare(&mut self, state: &ThermodynamicState) -> Result<(), SimulationError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let ln_mean = self.config.mean_radius.ln();
        let ln_sigma = self.config.geometric_sigma.ln();
        let multiplicity =
            self.config.number_per_kg / self.config.particles_per_cell as f64;

        self.cells = (0..state.n_cells())
            .map(|_| {
                (0..self.config.particles_per_cell)
                    .map(|_| SuperParticle {
                        radius: (ln_mean + ln_sigma * sample_standard_normal(&mut rng)).exp(),
                        multiplicity,
                    })
                    .collect()
            })
            .collect();

        info!(
            scheme = self.name(),
            n_cells = self.cells.len(),
            particles_per_cell = self.config.particles_per_cell,
            "particle population allocated"
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
        let dt = dt_total / f64::from(self.config.substeps);

        self.scales.to_internal(state);
        for j in 0..self.cells.len() {
            let particles = &mut self.cells[j];
            for _ in 0..self.config.substeps {
                let t_k = state.temperature[j] * self.scales.temperature;
                let p_pa = state.pressure[j] * self.scales.pressure;
                let qsat = saturation_mass_fraction(t_k, p_pa);
                let saturation_ratio = state.vapour[j] / qsat - 1.0;

                let mass_before = Self::liquid_mass(particles);
                for p in &mut *particles {
                    // r dr/dt = G S, integrated as r² growth to stay
                    // stable for small radii
                    let r_sq =
                        (p.radius * p.radius + 2.0 * GROWTH_COEFF * saturation_ratio * dt)
                            .max(MIN_RADIUS * MIN_RADIUS);
                    p.radius = r_sq.sqrt();
                }
                let mass_after = Self::liquid_mass(particles);

                // Exchange the condensed mass with vapour, deposit the
                // latent heat
                let dq = (mass_after - mass_before).min(state.vapour[j]);
                state.vapour[j] -= dq;
                state.temperature[j] +=
                    LATENT_HEAT / CP_DRY * dq / self.scales.temperature;
            }
            state.cloud_water[j] = Self::liquid_mass(particles);
        }
        self.scales.to_external(state);
        Ok(())
    }

    fn finalize(&mut self) {
        let total: usize = self.cells.iter().map(Vec::len).sum();
        info!(
            scheme = self.name(),
            steps = self.steps_seen,
            particles = total,
            "particle population released"
        );
        self.cells.clear();
    }
}
