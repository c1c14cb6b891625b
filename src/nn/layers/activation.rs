// src/nn/layers/activation.rs
// Activation function layers for neural networks
// These layers apply non-linear transformations element-wise to tensors

use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::number::GradFloat;
use crate::ops::{ReLU as ReLUOp, Sigmoid as SigmoidOp, Tanh as TanhOp};

/// ReLU activation layer: f(x) = max(0, x)
#[derive(Debug, Clone)]
pub struct ReLU {
    training: bool,
}

impl ReLU {
    pub fn new() -> Self {
        Self { training: true }
    }
}

impl Default for ReLU {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Module<T> for ReLU
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        engine.apply_operation(Box::new(ReLUOp), vec![input])
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

/// Sigmoid activation layer: f(x) = 1 / (1 + exp(-x))
/// Squashes values into (0, 1)
#[derive(Debug, Clone)]
pub struct Sigmoid {
    training: bool,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self { training: true }
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Module<T> for Sigmoid
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        engine.apply_operation(Box::new(SigmoidOp), vec![input])
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

/// Tanh activation layer: f(x) = tanh(x)
/// Zero-centred, output in (-1, 1)
#[derive(Debug, Clone)]
pub struct Tanh {
    training: bool,
}

impl Tanh {
    pub fn new() -> Self {
        Self { training: true }
    }
}

impl Default for Tanh {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Module<T> for Tanh
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        engine.apply_operation(Box::new(TanhOp), vec![input])
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
