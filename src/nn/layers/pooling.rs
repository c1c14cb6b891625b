// src/nn/layers/pooling.rs
// Pooling and reshaping layers used between convolutional and dense blocks

use crate::error::{GradError, Result};
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::number::GradFloat;
use crate::ops::{MaxPooling2d, Reshape};

/// Flattens every dimension after the batch axis: [N, d1, d2, ...] -> [N, d1*d2*...]
#[derive(Debug, Clone)]
pub struct Flatten {
    training: bool,
}

impl Flatten {
    pub fn new() -> Self {
        Self { training: true }
    }
}

impl Default for Flatten {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Module<T> for Flatten
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        let shape = engine.data(input)?.shape();
        if shape.is_empty() {
            return Err(GradError::InvalidArgument(
                "Flatten needs at least a batch dimension".into(),
            ));
        }
        let flat = vec![shape[0], shape[1..].iter().product()];
        engine.apply_operation(Box::new(Reshape::new(flat)), vec![input])
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

/// 2D max pooling with square windows.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    pub kernel_size: usize,
    pub stride: usize,
    training: bool,
}

impl MaxPool2d {
    /// Non-overlapping windows: stride equals the kernel size.
    pub fn new(kernel_size: usize) -> Self {
        Self::with_stride(kernel_size, kernel_size)
    }

    pub fn with_stride(kernel_size: usize, stride: usize) -> Self {
        Self {
            kernel_size,
            stride,
            training: true,
        }
    }
}

impl<T> Module<T> for MaxPool2d
where
    T: GradFloat,
{
    /// Input shape: [batch, channels, height, width]
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        let op = MaxPooling2d::new(self.kernel_size, self.stride);
        engine.apply_operation(Box::new(op), vec![input])
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
