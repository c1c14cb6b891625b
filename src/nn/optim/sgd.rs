// src/nn/optim/sgd.rs
// Stochastic gradient descent with momentum, Nesterov and L2 weight decay

use super::Optimizer;
use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Stochastic Gradient Descent.
///
/// For every parameter `p` with gradient `g`:
///
/// ```text
/// d = g + weight_decay * p
/// buf = momentum * buf + d          (buf starts as d)
/// d = d + momentum * buf            (nesterov)  |  d = buf  (classic momentum)
/// p = p - lr * d
/// ```
///
/// Weight decay here is the classic L2 penalty folded into the gradient, not the
/// decoupled variant used by [`Adam`](super::Adam).
#[derive(Debug, Clone)]
pub struct SGD<T = f32>
where
    T: GradFloat,
{
    params: Vec<NodeId>,
    lr: T,
    momentum: T,
    weight_decay: T,
    nesterov: bool,
    momentum_buffers: HashMap<NodeId, Tensor<T>>,
}

impl<T> SGD<T>
where
    T: GradFloat,
{
    /// Plain gradient descent: no momentum, no weight decay.
    pub fn new(params: Vec<NodeId>, lr: T) -> Self {
        Self {
            params,
            lr,
            momentum: T::zero(),
            weight_decay: T::zero(),
            nesterov: false,
            momentum_buffers: HashMap::new(),
        }
    }

    pub fn with_momentum(mut self, momentum: T) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: T) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Nesterov only has an effect together with a non-zero momentum.
    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn momentum(&self) -> T {
        self.momentum
    }

    pub fn weight_decay(&self) -> T {
        self.weight_decay
    }

    /// Momentum buffer of a parameter, once it has taken a step.
    pub fn momentum_buffer(&self, param: NodeId) -> Option<&Tensor<T>> {
        self.momentum_buffers.get(&param)
    }

    /// Effective update direction for one parameter. Updates the momentum buffer.
    fn direction(&mut self, id: NodeId, param: &Tensor<T>, grad: &Tensor<T>) -> Result<Tensor<T>> {
        let mut d = grad.clone();
        if self.weight_decay != T::zero() {
            d.scaled_add(self.weight_decay, param)?;
        }
        if self.momentum == T::zero() {
            return Ok(d);
        }

        let momentum = self.momentum;
        let buffer = match self.momentum_buffers.entry(id) {
            Entry::Vacant(slot) => slot.insert(d.clone()),
            Entry::Occupied(slot) => {
                let buffer = slot.into_mut();
                buffer.map_inplace(|b| b * momentum);
                buffer.accumulate(&d)?;
                buffer
            }
        };

        if self.nesterov {
            d.scaled_add(momentum, buffer)?;
            Ok(d)
        } else {
            Ok(buffer.clone())
        }
    }
}

impl<T> Optimizer<T> for SGD<T>
where
    T: GradFloat,
{
    fn step(&mut self, engine: &mut Engine<T>) -> Result<()> {
        for i in 0..self.params.len() {
            let id = self.params[i];
            let Some(grad) = engine.grad(id)?.cloned() else {
                continue;
            };
            let d = self.direction(id, engine.data(id)?, &grad)?;
            engine.data_mut(id)?.scaled_add(-self.lr, &d)?;
        }
        Ok(())
    }

    fn params(&self) -> &[NodeId] {
        &self.params
    }

    fn lr(&self) -> T {
        self.lr
    }

    fn set_lr(&mut self, lr: T) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn param_with_grad(engine: &mut Engine<f64>, value: f64, grad: f64) -> NodeId {
        let id = engine.parameter(Tensor::full(&[1], value));
        engine.set_grad(id, Some(Tensor::full(&[1], grad))).unwrap();
        id
    }

    fn value(engine: &Engine<f64>, id: NodeId) -> f64 {
        engine.data(id).unwrap().item().unwrap()
    }

    #[test]
    fn test_plain_step() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 1.0, 0.5);
        let mut sgd = SGD::new(vec![p], 0.1);
        sgd.step(&mut engine).unwrap();
        assert_relative_eq!(value(&engine, p), 0.95);
    }

    #[test]
    fn test_parameter_without_grad_is_skipped() {
        let mut engine = Engine::<f64>::new();
        let p = engine.parameter(Tensor::full(&[1], 1.0));
        let mut sgd = SGD::new(vec![p], 0.1).with_momentum(0.9);
        sgd.step(&mut engine).unwrap();
        assert_eq!(value(&engine, p), 1.0);
        assert!(sgd.momentum_buffer(p).is_none());
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 0.0, 1.0);
        let mut sgd = SGD::new(vec![p], 0.1).with_momentum(0.9);

        sgd.step(&mut engine).unwrap();
        assert_relative_eq!(value(&engine, p), -0.1);
        // buf = 0.9 * 1 + 1 = 1.9
        sgd.step(&mut engine).unwrap();
        assert_relative_eq!(value(&engine, p), -0.1 - 0.19);
        assert_relative_eq!(sgd.momentum_buffer(p).unwrap().item().unwrap(), 1.9);
    }

    #[test]
    fn test_nesterov_looks_ahead() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 0.0, 1.0);
        let mut sgd = SGD::new(vec![p], 0.1).with_momentum(0.5).with_nesterov(true);
        // buf = 1, d = 1 + 0.5 * 1
        sgd.step(&mut engine).unwrap();
        assert_relative_eq!(value(&engine, p), -0.15);
    }

    #[test]
    fn test_weight_decay_applies_with_zero_gradient() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 2.0, 0.0);
        let mut sgd = SGD::new(vec![p], 0.1).with_weight_decay(0.5);
        sgd.step(&mut engine).unwrap();
        // d = 0 + 0.5 * 2
        assert_relative_eq!(value(&engine, p), 1.9);
    }

    #[test]
    fn test_zero_grad_and_lr() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 1.0, 3.0);
        let mut sgd = SGD::new(vec![p], 0.1);
        sgd.zero_grad(&mut engine).unwrap();
        assert_eq!(engine.grad(p).unwrap().unwrap().to_vec(), vec![0.0]);

        sgd.set_lr(0.01);
        assert_eq!(sgd.lr(), 0.01);
        assert_eq!(sgd.params(), &[p]);
    }
}
