// src/nn/optim/adam.rs
// Adam with decoupled weight decay and optional AMSGrad

use super::Optimizer;
use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use ndarray::Zip;
use std::collections::HashMap;

/// Per-parameter moment estimates.
#[derive(Debug, Clone)]
struct AdamState<T>
where
    T: GradFloat,
{
    step: i32,
    exp_avg: Tensor<T>,
    exp_avg_sq: Tensor<T>,
    max_exp_avg_sq: Option<Tensor<T>>,
}

impl<T> AdamState<T>
where
    T: GradFloat,
{
    fn new(like: &Tensor<T>, amsgrad: bool) -> Self {
        Self {
            step: 0,
            exp_avg: like.zeros_like(),
            exp_avg_sq: like.zeros_like(),
            max_exp_avg_sq: amsgrad.then(|| like.zeros_like()),
        }
    }
}

/// Adam optimizer (Kingma & Ba), AdamW-style weight decay.
///
/// ```text
/// p = p - lr * weight_decay * p
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// v_max = max(v_max, v)                       (amsgrad)
/// p = p - lr * (m / (1 - beta1^t)) / (sqrt(v / (1 - beta2^t)) + eps)
/// ```
#[derive(Debug, Clone)]
pub struct Adam<T = f32>
where
    T: GradFloat,
{
    params: Vec<NodeId>,
    lr: T,
    beta1: T,
    beta2: T,
    eps: T,
    weight_decay: T,
    amsgrad: bool,
    state: HashMap<NodeId, AdamState<T>>,
}

impl<T> Adam<T>
where
    T: GradFloat,
{
    /// betas (0.9, 0.999), eps 1e-8, no weight decay.
    pub fn new(params: Vec<NodeId>, lr: T) -> Self {
        Self {
            params,
            lr,
            beta1: T::from_f64_lossy(0.9),
            beta2: T::from_f64_lossy(0.999),
            eps: T::from_f64_lossy(1e-8),
            weight_decay: T::zero(),
            amsgrad: false,
            state: HashMap::new(),
        }
    }

    pub fn with_betas(mut self, beta1: T, beta2: T) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_eps(mut self, eps: T) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: T) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_amsgrad(mut self, amsgrad: bool) -> Self {
        self.amsgrad = amsgrad;
        self
    }

    /// Number of updates applied to `param` so far.
    pub fn step_count(&self, param: NodeId) -> usize {
        self.state.get(&param).map_or(0, |s| s.step as usize)
    }
}

impl<T> Optimizer<T> for Adam<T>
where
    T: GradFloat,
{
    fn step(&mut self, engine: &mut Engine<T>) -> Result<()> {
        let one = T::one();
        let (beta1, beta2, eps, lr) = (self.beta1, self.beta2, self.eps, self.lr);
        let decay = lr * self.weight_decay;
        let amsgrad = self.amsgrad;

        for &id in &self.params {
            let Some(grad) = engine.grad(id)?.cloned() else {
                continue;
            };
            let state = self
                .state
                .entry(id)
                .or_insert_with(|| AdamState::new(&grad, amsgrad));
            state.step += 1;

            Zip::from(state.exp_avg.data_mut())
                .and(grad.data())
                .for_each(|m, &g| *m = beta1 * *m + (one - beta1) * g);
            Zip::from(state.exp_avg_sq.data_mut())
                .and(grad.data())
                .for_each(|v, &g| *v = beta2 * *v + (one - beta2) * g * g);

            let second_moment = match &mut state.max_exp_avg_sq {
                Some(max) => {
                    Zip::from(max.data_mut())
                        .and(state.exp_avg_sq.data())
                        .for_each(|mx, &v| {
                            if v > *mx {
                                *mx = v;
                            }
                        });
                    &*max
                }
                None => &state.exp_avg_sq,
            };

            let bias_correction1 = one - beta1.powi(state.step);
            let bias_correction2 = one - beta2.powi(state.step);

            let param = engine.data_mut(id)?;
            if decay != T::zero() {
                param.map_inplace(|p| p - decay * p);
            }
            Zip::from(param.data_mut())
                .and(state.exp_avg.data())
                .and(second_moment.data())
                .for_each(|p, &m, &v| {
                    let m_hat = m / bias_correction1;
                    let v_hat = v / bias_correction2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                });
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
    fn test_first_step_moves_by_lr() {
        // bias correction makes the first update exactly lr * sign(g), up to eps
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 1.0, 0.3);
        let q = param_with_grad(&mut engine, 1.0, -20.0);
        let mut adam = Adam::new(vec![p, q], 0.01);
        adam.step(&mut engine).unwrap();

        assert_relative_eq!(value(&engine, p), 0.99, epsilon = 1e-6);
        assert_relative_eq!(value(&engine, q), 1.01, epsilon = 1e-6);
        assert_eq!(adam.step_count(p), 1);
    }

    #[test]
    fn test_second_step_matches_reference_arithmetic() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 0.0, 1.0);
        let mut adam = Adam::new(vec![p], 0.1);
        adam.step(&mut engine).unwrap();
        engine.set_grad(p, Some(Tensor::full(&[1], 0.5))).unwrap();
        adam.step(&mut engine).unwrap();

        let m = 0.9 * 0.1 + 0.1 * 0.5;
        let v = 0.999 * 0.001 + 0.001 * 0.25;
        let m_hat = m / (1.0 - 0.9_f64.powi(2));
        let v_hat = v / (1.0 - 0.999_f64.powi(2));
        let expected = -0.1 - 0.1 * m_hat / (v_hat.sqrt() + 1e-8);
        assert_relative_eq!(value(&engine, p), expected, epsilon = 1e-7);
    }

    #[test]
    fn test_skips_parameters_without_grad() {
        let mut engine = Engine::<f64>::new();
        let p = engine.parameter(Tensor::full(&[1], 1.0));
        let mut adam = Adam::new(vec![p], 0.1);
        adam.step(&mut engine).unwrap();
        assert_eq!(value(&engine, p), 1.0);
        assert_eq!(adam.step_count(p), 0);
    }

    #[test]
    fn test_decoupled_weight_decay_with_zero_grad() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 2.0, 0.0);
        let mut adam = Adam::new(vec![p], 0.1).with_weight_decay(0.5);
        adam.step(&mut engine).unwrap();
        // only the decay term moves p: 2 - 0.1 * 0.5 * 2
        assert_relative_eq!(value(&engine, p), 1.9, epsilon = 1e-12);
    }

    #[test]
    fn test_amsgrad_keeps_max_second_moment() {
        let mut engine = Engine::<f64>::new();
        let p = param_with_grad(&mut engine, 0.0, 10.0);
        let q = param_with_grad(&mut engine, 0.0, 10.0);
        let mut plain = Adam::new(vec![p], 0.1);
        let mut ams = Adam::new(vec![q], 0.1).with_amsgrad(true);
        plain.step(&mut engine).unwrap();
        ams.step(&mut engine).unwrap();

        engine.set_grad(p, Some(Tensor::full(&[1], 0.1))).unwrap();
        engine.set_grad(q, Some(Tensor::full(&[1], 0.1))).unwrap();
        for _ in 0..5 {
            plain.step(&mut engine).unwrap();
            ams.step(&mut engine).unwrap();
        }
        // v only decays slowly, so both agree closely; the max never lets the
        // amsgrad step grow larger than the plain one
        assert!(value(&engine, q) >= value(&engine, p));
    }
}
