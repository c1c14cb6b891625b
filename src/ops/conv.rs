// src/ops/conv.rs
// Sliding-window operators over NCHW tensors.

use crate::error::Result;
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// 2D convolution: inputs are `[input, weight]`, output has no bias term.
#[derive(Debug, Clone, Copy)]
pub struct Convolution2d {
    pub stride: usize,
    pub padding: usize,
}

impl Convolution2d {
    pub fn new(stride: usize, padding: usize) -> Self {
        Self { stride, padding }
    }
}

impl<T> Operator<T> for Convolution2d
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].conv2d(inputs[1], self.stride, self.padding)
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        let (grad_input, grad_weight) =
            Tensor::conv2d_backward(inputs[0], inputs[1], grad_output, self.stride, self.padding)?;
        Ok(vec![grad_input, grad_weight])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Max pooling with square windows and no padding.
#[derive(Debug, Clone, Copy)]
pub struct MaxPooling2d {
    pub kernel_size: usize,
    pub stride: usize,
}

impl MaxPooling2d {
    pub fn new(kernel_size: usize, stride: usize) -> Self {
        Self { kernel_size, stride }
    }
}

impl<T> Operator<T> for MaxPooling2d
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].max_pool2d(self.kernel_size, self.stride)
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        let grad = Tensor::max_pool2d_backward(inputs[0], grad_output, self.kernel_size, self.stride)?;
        Ok(vec![grad])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convolution_gradient_shapes() {
        let x = Tensor::<f64>::ones(&[2, 3, 5, 5]);
        let w = Tensor::<f64>::ones(&[4, 3, 3, 3]);
        let op = Convolution2d::new(1, 1);
        let out = op.compute(&[&x, &w]).unwrap();
        assert_eq!(out.shape(), &[2, 4, 5, 5]);
        let grads = op.gradient(&Tensor::ones(out.shape()), &[&x, &w], &out).unwrap();
        assert_eq!(grads[0].shape(), x.shape());
        assert_eq!(grads[1].shape(), w.shape());
    }

    #[test]
    fn test_max_pooling_routes_gradient_to_max() {
        let x = Tensor::<f64>::from_vec(vec![1.0, 4.0, 2.0, 3.0], &[1, 1, 2, 2]).unwrap();
        let op = MaxPooling2d::new(2, 2);
        let out = op.compute(&[&x]).unwrap();
        assert_eq!(out.to_vec(), vec![4.0]);
        let grads = op.gradient(&Tensor::ones(&[1, 1, 1, 1]), &[&x], &out).unwrap();
        assert_eq!(grads[0].to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
    }
}
