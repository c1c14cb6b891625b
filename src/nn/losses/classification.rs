// src/nn/losses/classification.rs
// Cross-entropy over raw logits

use super::{Loss, Reduction};
use crate::error::{GradError, Result};
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;
use crate::ops::{LogSoftmax, Mul, Neg, Sum};
use crate::tensor::Tensor;

/// Categorical cross-entropy for multiclass classification.
///
/// Predictions are logits of shape [batch, classes]. Targets are either class
/// indices of shape [batch] (stored as floats) or a distribution over classes
/// with the same shape as the logits.
///
/// CE = reduce(-sum(targets * log_softmax(logits), axis=1))
///
/// The log-softmax is computed in one stable op, so large logits never overflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Turns class-index targets into a one-hot constant node.
    fn target_distribution<T: GradFloat>(
        engine: &mut Engine<T>,
        logits_shape: &[usize],
        targets: NodeId,
    ) -> Result<NodeId> {
        let target_data = engine.data(targets)?;
        if target_data.shape() == logits_shape {
            return Ok(targets);
        }
        if target_data.shape() != [logits_shape[0]] {
            return Err(GradError::shape_mismatch(
                "cross entropy targets",
                &[logits_shape[0]],
                target_data.shape(),
            ));
        }
        let one_hot = Tensor::one_hot(target_data, logits_shape[1])?;
        Ok(engine.constant(one_hot))
    }
}

impl<T> Loss<T> for CrossEntropyLoss
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, predictions: NodeId, targets: NodeId) -> Result<NodeId> {
        let logits_shape = engine.data(predictions)?.shape().to_vec();
        if logits_shape.len() != 2 {
            return Err(GradError::InvalidArgument(format!(
                "cross entropy expects logits of shape [batch, classes], got {logits_shape:?}"
            )));
        }
        let distribution = Self::target_distribution(engine, &logits_shape, targets)?;

        let log_probs = engine.apply_operation(Box::new(LogSoftmax), vec![predictions])?;
        let weighted = engine.apply_operation(Box::new(Mul), vec![distribution, log_probs])?;
        let per_sample = engine.apply_operation(Box::new(Sum::new(Some(vec![1]), false)), vec![weighted])?;
        let losses = engine.apply_operation(Box::new(Neg), vec![per_sample])?;
        self.reduction.apply(engine, losses)
    }

    fn reduction(&self) -> Reduction {
        self.reduction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_logits_give_log_num_classes() {
        let mut engine = Engine::<f64>::new();
        let logits = engine.variable(Tensor::zeros(&[2, 4]));
        let labels = engine.constant(Tensor::from_vec(vec![0.0, 3.0], &[2]).unwrap());

        let loss = CrossEntropyLoss::new().forward(&mut engine, logits, labels).unwrap();
        assert_relative_eq!(
            engine.data(loss).unwrap().item().unwrap(),
            4.0_f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_gradient_is_softmax_minus_one_hot() {
        let mut engine = Engine::<f64>::new();
        let logits = engine.tensor_from_vec(vec![1.0, 2.0, 3.0], &[1, 3], true).unwrap();
        let labels = engine.constant(Tensor::from_vec(vec![2.0], &[1]).unwrap());

        let loss = CrossEntropyLoss::new().forward(&mut engine, logits, labels).unwrap();
        engine.backward(loss).unwrap();

        let z: f64 = [1.0_f64, 2.0, 3.0].iter().map(|v| v.exp()).sum();
        let expected = [1.0_f64.exp() / z, 2.0_f64.exp() / z, 3.0_f64.exp() / z - 1.0];
        let grad = engine.grad(logits).unwrap().unwrap().to_vec();
        for (g, e) in grad.iter().zip(expected) {
            assert_relative_eq!(*g, e, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_one_hot_targets_match_index_targets() {
        let mut engine = Engine::<f64>::new();
        let logits = engine.variable(Tensor::from_vec(vec![0.5, -1.0, 2.0, 0.0], &[2, 2]).unwrap());
        let indices = engine.constant(Tensor::from_vec(vec![1.0, 0.0], &[2]).unwrap());
        let one_hot = engine.constant(Tensor::from_vec(vec![0.0, 1.0, 1.0, 0.0], &[2, 2]).unwrap());

        let loss = CrossEntropyLoss::with_reduction(Reduction::None);
        let a = loss.forward(&mut engine, logits, indices).unwrap();
        let b = loss.forward(&mut engine, logits, one_hot).unwrap();
        assert!(engine.data(a).unwrap().allclose(engine.data(b).unwrap(), 1e-12));
        assert_eq!(engine.data(a).unwrap().shape(), &[2]);
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let mut engine = Engine::<f32>::new();
        let logits = engine.variable(Tensor::from_vec(vec![1000.0, 0.0], &[1, 2]).unwrap());
        let labels = engine.constant(Tensor::from_vec(vec![1.0], &[1]).unwrap());
        let loss = CrossEntropyLoss::new().forward(&mut engine, logits, labels).unwrap();
        let value = engine.data(loss).unwrap().item().unwrap();
        assert!(value.is_finite());
        assert_relative_eq!(value, 1000.0, epsilon = 1e-2);
    }

    #[test]
    fn test_rejects_bad_labels() {
        let mut engine = Engine::<f32>::new();
        let logits = engine.variable(Tensor::zeros(&[2, 3]));
        let out_of_range = engine.constant(Tensor::from_vec(vec![0.0, 3.0], &[2]).unwrap());
        assert!(CrossEntropyLoss::new().forward(&mut engine, logits, out_of_range).is_err());

        let wrong_batch = engine.constant(Tensor::zeros(&[3]));
        let err = CrossEntropyLoss::new()
            .forward(&mut engine, logits, wrong_batch)
            .unwrap_err();
        assert!(matches!(err, GradError::ShapeMismatch { .. }));
    }
}
