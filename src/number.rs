// src/number.rs
// Numeric trait shared by every tensor, operator and optimizer in the crate.

use ndarray::{LinalgScalar, ScalarOperand};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

/// Floating point element type usable inside a [`Tensor`](crate::Tensor).
///
/// Implemented for `f32` (the default everywhere) and `f64`. The trait only
/// gathers the bounds ndarray and the operators need, plus a couple of lossy
/// conversions so generic code can write literals.
pub trait GradFloat:
    Float
    + FromPrimitive
    + LinalgScalar
    + ScalarOperand
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum<Self>
    + for<'a> Sum<&'a Self>
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + 'static
{
    /// Converts an f64 literal into this type.
    fn from_f64_lossy(value: f64) -> Self;

    /// Converts this value to f64.
    fn to_f64_lossy(self) -> f64;

    /// Converts a count (number of elements, batch size) into this type.
    fn from_usize_lossy(value: usize) -> Self {
        Self::from_f64_lossy(value as f64)
    }
}

impl GradFloat for f32 {
    fn from_f64_lossy(value: f64) -> Self {
        value as f32
    }

    fn to_f64_lossy(self) -> f64 {
        self as f64
    }
}

impl GradFloat for f64 {
    fn from_f64_lossy(value: f64) -> Self {
        value
    }

    fn to_f64_lossy(self) -> f64 {
        self
    }
}
