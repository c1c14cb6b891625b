// src/nn/losses/regression.rs
// Regression losses: mean squared error and mean absolute error

use super::{Loss, Reduction};
use crate::error::{GradError, Result};
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;
use crate::ops::{Abs, Mul, Sub};

fn check_same_shape<T: GradFloat>(
    engine: &Engine<T>,
    predictions: NodeId,
    targets: NodeId,
    context: &'static str,
) -> Result<()> {
    let pred_shape = engine.data(predictions)?.shape();
    let target_shape = engine.data(targets)?.shape();
    if pred_shape != target_shape {
        return Err(GradError::shape_mismatch(context, pred_shape, target_shape));
    }
    Ok(())
}

/// Mean Squared Error: reduce((predictions - targets)^2)
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss {
    reduction: Reduction,
}

impl MSELoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }
}

impl<T> Loss<T> for MSELoss
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, predictions: NodeId, targets: NodeId) -> Result<NodeId> {
        check_same_shape(engine, predictions, targets, "mse loss targets")?;

        let diff = engine.apply_operation(Box::new(Sub), vec![predictions, targets])?;
        let squared = engine.apply_operation(Box::new(Mul), vec![diff, diff])?;
        self.reduction.apply(engine, squared)
    }

    fn reduction(&self) -> Reduction {
        self.reduction
    }
}

/// Mean Absolute Error: reduce(|predictions - targets|)
#[derive(Debug, Clone, Copy, Default)]
pub struct L1Loss {
    reduction: Reduction,
}

impl L1Loss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }
}

impl<T> Loss<T> for L1Loss
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, predictions: NodeId, targets: NodeId) -> Result<NodeId> {
        check_same_shape(engine, predictions, targets, "l1 loss targets")?;

        let diff = engine.apply_operation(Box::new(Sub), vec![predictions, targets])?;
        let abs = engine.apply_operation(Box::new(Abs), vec![diff])?;
        self.reduction.apply(engine, abs)
    }

    fn reduction(&self) -> Reduction {
        self.reduction
    }
}
