// src/ops/batched.rs
// Row-wise operators that treat the last axis as the feature axis of a batch.

use crate::error::{GradError, Result};
use crate::number::GradFloat;
use crate::ops::{Operator, check_arity};
use crate::tensor::Tensor;

/// Numerically stable log-softmax over the last axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSoftmax;

impl<T> Operator<T> for LogSoftmax
where
    T: GradFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
        check_arity(self, inputs)?;
        inputs[0].log_softmax()
    }

    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>> {
        check_arity(self, inputs)?;
        // dx = g - softmax(x) * sum(g, last axis)
        let last = output
            .ndim()
            .checked_sub(1)
            .ok_or_else(|| GradError::InvalidArgument("log_softmax gradient of a scalar".into()))?;
        let softmax = output.exp();
        let row_sums = grad_output.sum(Some(&[last]), true)?;
        let grad = grad_output.sub(&softmax.mul(&row_sums)?)?;
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
    fn test_log_softmax_gradient_rows_sum_to_zero() {
        let x = Tensor::<f64>::from_vec(vec![1.0, 2.0, 3.0, 0.5, 0.5, 0.5], &[2, 3]).unwrap();
        let out = LogSoftmax.compute(&[&x]).unwrap();
        let grads = LogSoftmax.gradient(&Tensor::ones(&[2, 3]), &[&x], &out).unwrap();
        // With g = 1 every row gives 1 - 3 * softmax, which sums to 0
        let sums = grads[0].sum(Some(&[1]), false).unwrap();
        for s in sums.to_vec() {
            assert!(s.abs() < 1e-12);
        }
    }

    #[test]
    fn test_log_softmax_rejects_scalars() {
        let x = Tensor::<f32>::scalar(1.0);
        assert!(matches!(LogSoftmax.compute(&[&x]), Err(GradError::InvalidArgument(_))));
        let err = LogSoftmax.gradient(&x, &[&x], &x).unwrap_err();
        assert!(matches!(err, GradError::InvalidArgument(_)));
    }
}
