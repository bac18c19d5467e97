//! Error types for the coupled column simulation

use std::fmt;

/// Errors produced while wiring or running a coupled column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The scheduler was invoked off a coupling boundary, or a coupling
    /// interval failed to land exactly on its target step.
    Desynchronization {
        /// Step the clock actually reached
        step: u64,
        /// Step the schedule required
        expected: u64,
    },
    /// An adapter with a fixed internal step was asked to advance by a
    /// different span.
    StepMismatch {
        /// Name of the adapter that rejected the request
        adapter: &'static str,
        /// Span requested by the scheduler, in model steps
        requested: u64,
        /// The adapter's fixed step, in model steps
        fixed: u64,
    },
    /// A write was attempted past the last pre-allocated record slot.
    OutOfCapacity {
        /// Field whose track is full
        field: &'static str,
        /// Total record capacity of the buffer
        capacity: usize,
    },
    /// A field's length differs from the shape it was registered with.
    ShapeMismatch {
        /// Offending field
        field: &'static str,
        /// Registered per-timestep length
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },
    /// A configuration value that cannot produce a valid run.
    InvalidConfig(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desynchronization { step, expected } => write!(
                f,
                "clock at step {step} but the coupling schedule requires step {expected}"
            ),
            Self::StepMismatch {
                adapter,
                requested,
                fixed,
            } => write!(
                f,
                "adapter '{adapter}' was asked to advance {requested} steps but its fixed step is {fixed}"
            ),
            Self::OutOfCapacity { field, capacity } => write!(
                f,
                "output track for '{field}' is full ({capacity} records)"
            ),
            Self::ShapeMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field '{field}' has length {actual} but was registered with length {expected}"
            ),
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for SimulationError {}
