//! Coupled Atmospheric Column Simulation Core Library
//!
//! A time-stepped one-dimensional atmospheric column in which a continuum
//! fluid-transport solver ("dynamics") and a discrete-particle
//! microphysics process advance in lock-step at a coarse coupling
//! interval while each sub-steps internally at its own rate.
//!
//! ## Coupling model
//!
//! - Integer model-step clock; sub-step boundaries are never interpolated
//! - Two event streams (coupling boundaries, observation checkpoints)
//!   merged by taking the minimum next event time
//! - Explicit receive/send state transfer at coupling boundaries only, so
//!   neither subsystem ever observes a half-updated view of the other
//! - Reversible reference-scale unit conversion at the microphysics
//!   boundary

// Core types and utilities
pub mod core_types;

// Coupling machinery
pub mod dynamics;
pub mod microphysics;
pub mod scheduler;

// Run plumbing
pub mod error;
pub mod output;
pub mod scales;
pub mod simulation;

// Re-export core types
pub use core_types::{
    CouplingSchedule, Kelvin, Metres, Pascals, Seconds, SimulationClock, StateProfiles,
    ThermodynamicState, MASS_FRACTION_FIELDS, SCALAR_FIELDS,
};

// Re-export the coupling surface
pub use dynamics::{DynamicsAdapter, KinematicConfig, KinematicDriver};
pub use microphysics::{
    MicrophysicsAdapter, ParticleConfig, ParticleEnsemble, SaturationAdjustment, SaturationConfig,
};
pub use scheduler::{
    CoupledStepScheduler, MergeObservers, NoObserver, ObservationSchedule, PeriodicObserver,
};

// Re-export run plumbing
pub use error::SimulationError;
pub use output::{OutputBuffer, OutputRecord, RecordedField};
pub use scales::ReferenceScales;
pub use simulation::{ColumnConfig, ColumnSimulation};
