// src/ops/scalar.rs
// Operators combining a tensor with a constant scalar.

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Scalar addition: output = input + scalar
#[derive(Debug, Clone)]
pub struct AddScalar<T> {
    pub scalar: T,
}

impl<T> AddScalar<T> {
    pub fn new(scalar: T) -> Self {
        Self { scalar }
    }
}

impl<T> Operator<T> for AddScalar<T>
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].add_scalar(self.scalar))
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(x + c) = 1
        Ok(vec![grad_output.clone()])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Scalar multiplication: output = input * scalar
#[derive(Debug, Clone)]
pub struct MulScalar<T> {
    pub scalar: T,
}

impl<T> MulScalar<T> {
    pub fn new(scalar: T) -> Self {
        Self { scalar }
    }
}

impl<T> Operator<T> for MulScalar<T>
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].mul_scalar(self.scalar))
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        Ok(vec![grad_output.mul_scalar(self.scalar)])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Power with a constant exponent: output = input ^ exponent
#[derive(Debug, Clone)]
pub struct PowScalar<T> {
    pub exponent: T,
}

impl<T> PowScalar<T> {
    pub fn new(exponent: T) -> Self {
        Self { exponent }
    }
}

impl<T> Operator<T> for PowScalar<T>
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].powf(self.exponent))
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(x^n) = n * x^(n-1)
        let n = self.exponent;
        let local = inputs[0].map(|x| n * x.powf(n - T::one()));
        Ok(vec![grad_output.mul(&local)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow_scalar_gradient() {
        let x = Tensor::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let op = PowScalar::new(2.0);
        let out = op.compute(&[&x]).unwrap();
        assert_eq!(out.to_vec(), vec![1.0, 4.0, 9.0]);
        let grads = op.gradient(&Tensor::ones(&[3]), &[&x], &out).unwrap();
        assert_eq!(grads[0].to_vec(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_mul_scalar_scales_gradient() {
        let x = Tensor::<f32>::ones(&[2]);
        let op = MulScalar::new(3.0f32);
        let out = op.compute(&[&x]).unwrap();
        let grads = op.gradient(&Tensor::full(&[2], 0.5), &[&x], &out).unwrap();
        assert_eq!(grads[0].to_vec(), vec![1.5, 1.5]);
    }
}
