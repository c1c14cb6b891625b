// src/ops/reshape.rs
// Shape-changing operators. Neither touches the values, so the gradient is just
// the upstream gradient mapped back onto the input shape.

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Reshape operation: output = reshape(input, new_shape)
#[derive(Debug, Clone)]
pub struct Reshape {
    pub new_shape: Vec<usize>,
}

impl Reshape {
    pub fn new(new_shape: Vec<usize>) -> Self {
        Self { new_shape }
    }
}

impl<T> Operator<T> for Reshape
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].reshape(&self.new_shape)
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        Ok(vec![grad_output.reshape(inputs[0].shape())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Broadcast operation: output = broadcast(input, target_shape)
#[derive(Debug, Clone)]
pub struct BroadcastTo {
    pub target_shape: Vec<usize>,
}

impl BroadcastTo {
    pub fn new(target_shape: Vec<usize>) -> Self {
        Self { target_shape }
    }
}

impl<T> Operator<T> for BroadcastTo
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].broadcast_to(&self.target_shape)
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // Sum over the broadcast dimensions
        Ok(vec![grad_output.reduce_to_shape(inputs[0].shape())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
