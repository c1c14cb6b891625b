// src/ops/reduction.rs
// Reduction operations for the computational graph
// These wrap tensor API methods to enable automatic differentiation

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Spreads a reduced gradient back over the input shape.
/// Reduced axes are first restored as size 1, then broadcast.
fn expand_reduction<T>(
    grad_output: &Tensor<T>,
    axes: Option<&[usize]>,
    input_shape: &[usize],
) -> Result<Tensor<T>>
where
    T: GradFloat,
{
    let kept: Vec<usize> = input_shape
        .iter()
        .enumerate()
        .map(|(i, &d)| match axes {
            Some(axes) if !axes.contains(&i) => d,
            _ => 1,
        })
        .collect();
    grad_output.reshape(&kept)?.broadcast_to(input_shape)
}

/// Sum reduction: output = sum(input, axes)
/// Reduces along the given axes, or over every element when `axes` is None
#[derive(Debug, Clone, Default)]
pub struct Sum {
    pub axes: Option<Vec<usize>>,
    /// Whether reduced dimensions stay in the output as size 1
    pub keep_dims: bool,
}

impl Sum {
    pub fn new(axes: Option<Vec<usize>>, keep_dims: bool) -> Self {
        Self { axes, keep_dims }
    }

    pub fn all() -> Self {
        Self::new(None, false)
    }
}

impl<T> Operator<T> for Sum
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].sum(self.axes.as_deref(), self.keep_dims)
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // Every summed element receives the upstream gradient unchanged
        let grad = expand_reduction(grad_output, self.axes.as_deref(), inputs[0].shape())?;
        Ok(vec![grad])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Mean reduction: output = sum(input, axes) / count
#[derive(Debug, Clone, Default)]
pub struct Mean {
    pub axes: Option<Vec<usize>>,
    pub keep_dims: bool,
}

impl Mean {
    pub fn new(axes: Option<Vec<usize>>, keep_dims: bool) -> Self {
        Self { axes, keep_dims }
    }

    pub fn all() -> Self {
        Self::new(None, false)
    }
}

impl<T> Operator<T> for Mean
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].mean(self.axes.as_deref(), self.keep_dims)
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        let count = inputs[0].reduced_count(self.axes.as_deref())?;
        let grad = expand_reduction(grad_output, self.axes.as_deref(), inputs[0].shape())?;
        Ok(vec![grad.div_scalar(T::from_usize_lossy(count))])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
