// src/nn/losses/mod.rs
// Loss functions recorded as ordinary graph operations, so backward through
// the loss reaches every parameter that produced the predictions.

pub mod classification;
pub mod regression;

pub use classification::CrossEntropyLoss;
pub use regression::{L1Loss, MSELoss};

use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;
use crate::ops::{Mean, Sum};

/// How per-element losses are combined into the returned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Average over every element (scalar output)
    #[default]
    Mean,
    /// Sum over every element (scalar output)
    Sum,
    /// Keep the per-element losses
    None,
}

impl Reduction {
    /// Applies the reduction to `losses`, recording the op on the engine.
    pub(crate) fn apply<T: GradFloat>(self, engine: &mut Engine<T>, losses: NodeId) -> Result<NodeId> {
        match self {
            Reduction::Mean => engine.apply_operation(Box::new(Mean::all()), vec![losses]),
            Reduction::Sum => engine.apply_operation(Box::new(Sum::all()), vec![losses]),
            Reduction::None => Ok(losses),
        }
    }
}

/// Base trait for all loss functions.
///
/// `forward` takes the prediction node and a target node and returns the loss
/// node. With `Reduction::Mean` or `Reduction::Sum` the result is a scalar that
/// can be passed straight to [`Engine::backward`].
pub trait Loss<T = f32>
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, predictions: NodeId, targets: NodeId) -> Result<NodeId>;

    fn reduction(&self) -> Reduction;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn test_reduction_none_is_identity() {
        let mut engine = Engine::<f32>::new();
        let x = engine.variable(Tensor::ones(&[3]));
        assert_eq!(Reduction::None.apply(&mut engine, x).unwrap(), x);
    }

    #[test]
    fn test_reduction_mean_and_sum() {
        let mut engine = Engine::<f64>::new();
        let x = engine.variable(Tensor::from_vec(vec![1.0, 2.0, 3.0, 6.0], &[2, 2]).unwrap());
        let mean = Reduction::Mean.apply(&mut engine, x).unwrap();
        let sum = Reduction::Sum.apply(&mut engine, x).unwrap();
        assert_eq!(engine.data(mean).unwrap().item().unwrap(), 3.0);
        assert_eq!(engine.data(sum).unwrap().item().unwrap(), 12.0);
        assert_eq!(Reduction::default(), Reduction::Mean);
    }
}
