// src/ops/matrix.rs
// Matrix operations for the computational graph

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Matrix multiplication: output = input1 @ input2 (both 2-D)
#[derive(Debug, Clone, Copy, Default)]
pub struct MatMul;

impl<T> Operator<T> for MatMul
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].matmul(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // C = A @ B
        // dA = grad_output @ B^T
        // dB = A^T @ grad_output
        let grad_a = grad_output.matmul(&inputs[1].transpose(None)?)?;
        let grad_b = inputs[0].transpose(None)?.matmul(grad_output)?;
        Ok(vec![grad_a, grad_b])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Axis permutation. Without explicit axes it reverses them (matrix transpose).
#[derive(Debug, Clone, Default)]
pub struct Transpose {
    pub axes: Option<Vec<usize>>,
}

impl Transpose {
    pub fn new() -> Self {
        Self { axes: None }
    }

    pub fn with_axes(axes: Vec<usize>) -> Self {
        Self { axes: Some(axes) }
    }
}

impl<T> Operator<T> for Transpose
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].transpose(self.axes.as_deref())
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        match &self.axes {
            Some(axes) => {
                // Invert the permutation to get back to the original order
                let mut inverse = vec![0; axes.len()];
                for (new_pos, &old_pos) in axes.iter().enumerate() {
                    inverse[old_pos] = new_pos;
                }
                Ok(vec![grad_output.transpose(Some(&inverse))?])
            }
            None => Ok(vec![grad_output.transpose(None)?]),
        }
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
