// src/ops/unary.rs
// Unary operations for the computational graph
// These wrap tensor API methods to enable automatic differentiation

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Negation: output = -input
#[derive(Debug, Clone, Copy, Default)]
pub struct Neg;

impl<T> Operator<T> for Neg
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].neg())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        Ok(vec![grad_output.neg()])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise exponential: output = exp(input)
#[derive(Debug, Clone, Copy, Default)]
pub struct Exp;

impl<T> Operator<T> for Exp
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].exp())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(exp(x)) = exp(x), which is the forward output
        Ok(vec![grad_output.mul(output)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise natural logarithm: output = ln(input)
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

impl<T> Operator<T> for Log
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].ln())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(ln(x)) = 1/x
        Ok(vec![grad_output.div(inputs[0])?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise absolute value: output = |input|
#[derive(Debug, Clone, Copy, Default)]
pub struct Abs;

impl<T> Operator<T> for Abs
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].abs())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // Subgradient 0 at the kink
        Ok(vec![grad_output.mul(&inputs[0].sign())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Rectified linear unit: output = max(0, input)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl<T> Operator<T> for ReLU
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].relu())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // Gradient passes where the input was strictly positive
        Ok(vec![grad_output.mul(&inputs[0].positive_mask())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Logistic sigmoid: output = 1 / (1 + exp(-input))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl<T> Operator<T> for Sigmoid
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].sigmoid())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // sigmoid'(x) = s * (1 - s)
        let local = output.map(|s| s * (T::one() - s));
        Ok(vec![grad_output.mul(&local)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Hyperbolic tangent: output = tanh(input)
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl<T> Operator<T> for Tanh
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        Ok(inputs[0].tanh())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // tanh'(x) = 1 - tanh(x)^2
        let local = output.map(|t| T::one() - t * t);
        Ok(vec![grad_output.mul(&local)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
