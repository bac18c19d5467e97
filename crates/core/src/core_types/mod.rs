//! Core types and utilities

pub mod clock;
pub mod state;
pub mod units;

pub use clock::{CouplingSchedule, SimulationClock};
pub use state::{StateProfiles, ThermodynamicState, MASS_FRACTION_FIELDS, SCALAR_FIELDS};
pub use units::{Kelvin, Metres, Pascals, Seconds};
