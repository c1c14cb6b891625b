// src/ops/mod.rs
// Differentiable operators recorded by the graph engine.
// Each operator knows how to compute its output from its inputs and how to map an
// output gradient back to one gradient per input (vector-Jacobian product).
use crate::error::{GradError, Result};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use std::any::type_name;

// All operators in the computational graph implement this trait.
pub trait Operator<T>: std::fmt::Debug + Send + Sync
where
    T: GradFloat,
{
    // Compute function computes the output in the computational graph.
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>>;

    // Gradient function maps the gradient of the output to the gradient of every input.
    // `output` is the value `compute` produced during the forward pass.
    fn gradient(
        &self,
        grad_output: &Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>>;

    // Number of inputs this operator expects
    fn num_inputs(&self) -> usize;

    fn name(&self) -> String {
        let full_name = type_name::<Self>();
        let base = full_name.split('<').next().unwrap_or(full_name);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }
}

/// Fails with `ArityMismatch` unless exactly `expected` inputs were supplied.
pub(crate) fn check_arity<T, O>(op: &O, inputs: &[&Tensor<T>]) -> Result<()>
where
    T: GradFloat,
    O: Operator<T> + ?Sized,
{
    if inputs.len() != op.num_inputs() {
        return Err(GradError::ArityMismatch {
            op: op.name(),
            expected: op.num_inputs(),
            actual: inputs.len(),
        });
    }
    Ok(())
}

pub mod basic;
pub mod batched;
pub mod conv;
pub mod matrix;
pub mod reduction;
pub mod reshape;
pub mod scalar;
pub mod unary;

// Re-export all operations for convenient importing
pub use basic::*;
pub use batched::*;
pub use conv::*;
pub use matrix::*;
pub use reduction::*;
pub use reshape::*;
pub use scalar::*;
pub use unary::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_names_strip_paths() {
        assert_eq!(Operator::<f32>::name(&Add), "Add");
        assert_eq!(Operator::<f64>::name(&Transpose::new()), "Transpose");
    }

    #[test]
    fn test_arity_is_checked() {
        let a = Tensor::<f32>::ones(&[2]);
        let err = Add.compute(&[&a]).unwrap_err();
        assert!(matches!(err, GradError::ArityMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_gradient_arity_is_checked_for_output_only_operators() {
        let a = Tensor::<f64>::ones(&[2, 2]);
        let g = Tensor::<f64>::ones(&[2, 2]);
        let ops: Vec<Box<dyn Operator<f64>>> = vec![
            Box::new(Neg),
            Box::new(Exp),
            Box::new(Sigmoid),
            Box::new(Tanh),
            Box::new(AddScalar::new(1.0)),
            Box::new(MulScalar::new(2.0)),
            Box::new(LogSoftmax),
            Box::new(Transpose::new()),
        ];
        for op in &ops {
            let err = op.gradient(&g, &[&a, &a], &a).unwrap_err();
            assert!(
                matches!(err, GradError::ArityMismatch { expected: 1, actual: 2, .. }),
                "{} accepted two inputs",
                op.name()
            );
            assert!(op.gradient(&g, &[], &a).is_err());
        }
    }
}
