// src/ops/basic.rs
// Binary arithmetic operators with numpy-style broadcasting.
// Gradients are summed back down to each input's own shape.

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Element-wise addition: output = input1 + input2
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl<T> Operator<T> for Add
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].add(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(x + y) = 1, d/dy(x + y) = 1
        Ok(vec![
            grad_output.reduce_to_shape(inputs[0].shape())?,
            grad_output.reduce_to_shape(inputs[1].shape())?,
        ])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Element-wise subtraction: output = input1 - input2
#[derive(Debug, Clone, Copy, Default)]
pub struct Sub;

impl<T> Operator<T> for Sub
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].sub(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        Ok(vec![
            grad_output.reduce_to_shape(inputs[0].shape())?,
            grad_output.neg().reduce_to_shape(inputs[1].shape())?,
        ])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Element-wise multiplication: output = input1 * input2
#[derive(Debug, Clone, Copy, Default)]
pub struct Mul;

impl<T> Operator<T> for Mul
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].mul(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(x * y) = y, d/dy(x * y) = x
        let grad_lhs = grad_output.mul(inputs[1])?;
        let grad_rhs = grad_output.mul(inputs[0])?;
        Ok(vec![
            grad_lhs.reduce_to_shape(inputs[0].shape())?,
            grad_rhs.reduce_to_shape(inputs[1].shape())?,
        ])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Element-wise division: output = input1 / input2
#[derive(Debug, Clone, Copy, Default)]
pub struct Div;

impl<T> Operator<T> for Div
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].div(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // d/dx(x / y) = 1 / y, d/dy(x / y) = -x / y^2 = -output / y
        let grad_lhs = grad_output.div(inputs[1])?;
        let grad_rhs = grad_output.mul(output)?.div(inputs[1])?.neg();
        Ok(vec![
            grad_lhs.reduce_to_shape(inputs[0].shape())?,
            grad_rhs.reduce_to_shape(inputs[1].shape())?,
        ])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}
