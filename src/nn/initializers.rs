// src/nn/initializers.rs
// Weight initialization schemes. Every function samples from an explicit rng so
// models can be built reproducibly with a seeded `StdRng`.

use crate::error::{GradError, Result};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use rand::Rng;

/// Fan-in and fan-out of a weight tensor.
/// `[out, in]` for linear layers, `[out, in, kh, kw]` for convolutions.
pub fn fan_in_and_fan_out(shape: &[usize]) -> Result<(usize, usize)> {
    if shape.len() < 2 {
        return Err(GradError::InvalidArgument(format!(
            "fan in/out needs at least 2 dimensions, got {shape:?}"
        )));
    }
    let receptive_field: usize = shape[2..].iter().product();
    Ok((shape[1] * receptive_field, shape[0] * receptive_field))
}

/// Xavier/Glorot uniform initialization
/// Samples from U(-a, a) where a = gain * sqrt(6 / (fan_in + fan_out))
pub fn xavier_uniform<T, R>(shape: &[usize], gain: f64, rng: &mut R) -> Result<Tensor<T>>
where
    T: GradFloat,
    R: Rng + ?Sized,
{
    let (fan_in, fan_out) = fan_in_and_fan_out(shape)?;
    let a = gain * (6.0 / (fan_in + fan_out) as f64).sqrt();
    Tensor::rand_uniform(shape, -a, a, rng)
}

/// Xavier/Glorot normal initialization
/// Samples from N(0, std) where std = gain * sqrt(2 / (fan_in + fan_out))
pub fn xavier_normal<T, R>(shape: &[usize], gain: f64, rng: &mut R) -> Result<Tensor<T>>
where
    T: GradFloat,
    R: Rng + ?Sized,
{
    let (fan_in, fan_out) = fan_in_and_fan_out(shape)?;
    let std = gain * (2.0 / (fan_in + fan_out) as f64).sqrt();
    Tensor::randn(shape, 0.0, std, rng)
}

/// Kaiming/He uniform initialization for ReLU networks
/// Samples from U(-bound, bound) where bound = sqrt(6 / fan_in)
pub fn kaiming_uniform<T, R>(shape: &[usize], rng: &mut R) -> Result<Tensor<T>>
where
    T: GradFloat,
    R: Rng + ?Sized,
{
    let (fan_in, _) = fan_in_and_fan_out(shape)?;
    let bound = (6.0 / fan_in as f64).sqrt();
    Tensor::rand_uniform(shape, -bound, bound, rng)
}

/// Kaiming/He normal initialization for ReLU networks
/// Samples from N(0, std) where std = sqrt(2 / fan_in)
pub fn kaiming_normal<T, R>(shape: &[usize], rng: &mut R) -> Result<Tensor<T>>
where
    T: GradFloat,
    R: Rng + ?Sized,
{
    let (fan_in, _) = fan_in_and_fan_out(shape)?;
    let std = (2.0 / fan_in as f64).sqrt();
    Tensor::randn(shape, 0.0, std, rng)
}

pub fn constant<T: GradFloat>(shape: &[usize], value: T) -> Tensor<T> {
    Tensor::full(shape, value)
}

pub fn zeros<T: GradFloat>(shape: &[usize]) -> Tensor<T> {
    Tensor::zeros(shape)
}

/// Initialization scheme selectable at layer construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Init {
    #[default]
    XavierUniform,
    XavierNormal,
    KaimingUniform,
    KaimingNormal,
    Constant(f64),
    Zeros,
}

impl Init {
    pub fn tensor<T, R>(self, shape: &[usize], rng: &mut R) -> Result<Tensor<T>>
    where
        T: GradFloat,
        R: Rng + ?Sized,
    {
        match self {
            Init::XavierUniform => xavier_uniform(shape, 1.0, rng),
            Init::XavierNormal => xavier_normal(shape, 1.0, rng),
            Init::KaimingUniform => kaiming_uniform(shape, rng),
            Init::KaimingNormal => kaiming_normal(shape, rng),
            Init::Constant(value) => Ok(constant(shape, T::from_f64_lossy(value))),
            Init::Zeros => Ok(zeros(shape)),
        }
    }
}
