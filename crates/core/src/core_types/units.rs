//! Semantic unit types for type-safe physical quantity handling
//!
//! Newtype wrappers for the scalar quantities that cross module boundaries,
//! preventing accidental mixing of incompatible units (e.g. seconds with
//! model steps, or pascals with kelvins). All wrappers are
//! `#[repr(transparent)]` over `f64`, expose the inner value through
//! `Deref`, and validate their physical range in `new`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Deref, Div, Mul, Sub};

macro_rules! unit_type {
    ($(#[$meta:meta])* $name:ident, $display:literal, $min:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(f64);

        impl $name {
            /// Create a new value. Asserts the physical lower bound.
            #[inline]
            #[must_use]
            #[track_caller]
            pub fn new(value: f64) -> Self {
                assert!(
                    value >= $min,
                    concat!(stringify!($name), "::new: value {} below physical minimum {}"),
                    value,
                    $min
                );
                $name(value)
            }

            /// Raw inner value.
            #[inline]
            #[must_use]
            pub fn value(self) -> f64 {
                self.0
            }
        }

        impl Deref for $name {
            type Target = f64;
            #[inline]
            fn deref(&self) -> &f64 {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!("{}", $display), self.0)
            }
        }

        impl Add for $name {
            type Output = $name;
            #[inline]
            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = $name;
            #[inline]
            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = $name;
            #[inline]
            fn mul(self, rhs: f64) -> $name {
                $name(self.0 * rhs)
            }
        }

        impl Div<f64> for $name {
            type Output = $name;
            #[inline]
            fn div(self, rhs: f64) -> $name {
                $name(self.0 / rhs)
            }
        }
    };
}

unit_type!(
    /// Elapsed or interval time in seconds. Negative durations are invalid.
    Seconds,
    " s",
    0.0
);

unit_type!(
    /// Length or altitude in metres. Negative lengths are invalid.
    Metres,
    " m",
    0.0
);

unit_type!(
    /// Absolute temperature in kelvins. Bounded below by absolute zero.
    Kelvin,
    " K",
    0.0
);

unit_type!(
    /// Absolute pressure in pascals. Negative pressure is invalid.
    Pascals,
    " Pa",
    0.0
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_deref() {
        let t = Seconds::new(12.5);
        assert_eq!(*t, 12.5);
        assert_eq!(t.value(), 12.5);
    }

    #[test]
    #[should_panic(expected = "Kelvin::new")]
    fn test_negative_kelvin_rejected() {
        let _ = Kelvin::new(-1.0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Metres::new(100.0);
        let b = Metres::new(40.0);
        assert_eq!(*(a - b), 60.0);
        assert_eq!(*(a + b), 140.0);
        assert_eq!(*(a * 0.5), 50.0);
        assert_eq!(*(a / 4.0), 25.0);
    }

    #[test]
    fn test_display_includes_unit() {
        assert_eq!(Pascals::new(101325.0).to_string(), "101325 Pa");
        assert_eq!(Seconds::new(1.5).to_string(), "1.5 s");
    }
}
