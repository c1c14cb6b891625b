// src/nn/optim/mod.rs
// Optimizers update parameter nodes in place from their accumulated gradients.

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::SGD;

use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;

/// Common interface of every optimizer.
///
/// An optimizer is built from a fixed sequence of parameter node ids (usually
/// `module.parameter_ids()`) and owns whatever per-parameter state its update
/// rule needs. Parameters whose gradient is absent are skipped by `step`.
pub trait Optimizer<T = f32>
where
    T: GradFloat,
{
    /// Applies one update to every parameter that has a gradient.
    fn step(&mut self, engine: &mut Engine<T>) -> Result<()>;

    /// The parameters this optimizer updates, in construction order.
    fn params(&self) -> &[NodeId];

    fn lr(&self) -> T;

    fn set_lr(&mut self, lr: T);

    /// Zeroes the gradient of every managed parameter.
    fn zero_grad(&self, engine: &mut Engine<T>) -> Result<()> {
        for &id in self.params() {
            engine.zero_grad(id)?;
        }
        Ok(())
    }
}

/// Global L2 norm of the gradients of `params`. Missing gradients count as zero.
pub fn grad_norm<T: GradFloat>(engine: &Engine<T>, params: &[NodeId]) -> Result<T> {
    let mut total = T::zero();
    for &id in params {
        if let Some(grad) = engine.grad(id)? {
            total += grad.norm_sq();
        }
    }
    Ok(total.sqrt())
}

/// Rescales the gradients of `params` so their global norm is at most `max_norm`.
/// Returns the norm measured before clipping.
pub fn clip_grad_norm<T: GradFloat>(
    engine: &mut Engine<T>,
    params: &[NodeId],
    max_norm: T,
) -> Result<T> {
    let total_norm = grad_norm(engine, params)?;
    if total_norm > max_norm {
        let coef = max_norm / (total_norm + T::from_f64_lossy(1e-6));
        log::debug!("clipping gradients: norm {total_norm} > {max_norm}");
        for &id in params {
            if let Some(grad) = engine.grad_mut(id)? {
                grad.map_inplace(|g| g * coef);
            }
        }
    }
    Ok(total_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use approx::assert_relative_eq;

    #[test]
    fn test_grad_norm_ignores_missing_gradients() {
        let mut engine = Engine::<f64>::new();
        let a = engine.parameter(Tensor::zeros(&[2]));
        let b = engine.parameter(Tensor::zeros(&[1]));
        engine
            .set_grad(a, Some(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap()))
            .unwrap();
        assert_relative_eq!(grad_norm(&engine, &[a, b]).unwrap(), 5.0);
    }

    #[test]
    fn test_clip_grad_norm_rescales_above_threshold() {
        let mut engine = Engine::<f64>::new();
        let a = engine.parameter(Tensor::zeros(&[2]));
        engine
            .set_grad(a, Some(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap()))
            .unwrap();

        let norm = clip_grad_norm(&mut engine, &[a], 1.0).unwrap();
        assert_relative_eq!(norm, 5.0);
        assert_relative_eq!(grad_norm(&engine, &[a]).unwrap(), 1.0, epsilon = 1e-5);

        // already below the threshold: untouched
        let norm = clip_grad_norm(&mut engine, &[a], 10.0).unwrap();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }
}
