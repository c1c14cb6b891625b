// src/nn/layers/linear.rs
// Linear layer implementation using the computational graph engine
// This is the fundamental building block for feedforward neural networks

use crate::error::{GradError, Result};
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::nn::initializers::Init;
use crate::nn::parameter::Parameter;
use crate::number::GradFloat;
use crate::ops::{Add, MatMul, Transpose};
use crate::tensor::Tensor;
use rand::Rng;

/// Linear transformation layer: y = x * W^T + b
/// Weight matrix is stored as [out_features, in_features] to match PyTorch convention
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Parameter,
    pub bias: Option<Parameter>,
    pub in_features: usize,
    pub out_features: usize,
    training: bool,
}

impl Linear {
    /// Xavier uniform weights and zero bias, sampled from the thread rng.
    pub fn new<T: GradFloat>(
        engine: &mut Engine<T>,
        in_features: usize,
        out_features: usize,
        bias: bool,
    ) -> Result<Self> {
        Self::new_with_rng(engine, in_features, out_features, bias, &mut rand::rng())
    }

    /// Same as [`Linear::new`] with an explicit (typically seeded) rng.
    pub fn new_with_rng<T, R>(
        engine: &mut Engine<T>,
        in_features: usize,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self>
    where
        T: GradFloat,
        R: Rng + ?Sized,
    {
        let weight = Init::XavierUniform.tensor(&[out_features, in_features], rng)?;
        let bias = bias.then(|| Tensor::zeros(&[out_features]));
        Self::from_tensors(engine, weight, bias)
    }

    /// Create linear layer with custom weight and bias tensors
    pub fn from_tensors<T: GradFloat>(
        engine: &mut Engine<T>,
        weight: Tensor<T>,
        bias: Option<Tensor<T>>,
    ) -> Result<Self> {
        if weight.ndim() != 2 {
            return Err(GradError::InvalidArgument(format!(
                "linear weight must be [out_features, in_features], got {:?}",
                weight.shape()
            )));
        }
        let (out_features, in_features) = (weight.shape()[0], weight.shape()[1]);

        if let Some(b) = &bias {
            if b.shape() != [out_features] {
                return Err(GradError::shape_mismatch("linear bias", &[out_features], b.shape()));
            }
        }

        Ok(Self {
            weight: Parameter::new(engine, weight, "weight"),
            bias: bias.map(|b| Parameter::new(engine, b, "bias")),
            in_features,
            out_features,
            training: true,
        })
    }
}

impl<T> Module<T> for Linear
where
    T: GradFloat,
{
    /// Input shape: [batch_size, in_features]
    /// Output shape: [batch_size, out_features]
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        let shape = engine.data(input)?.shape();
        if shape.len() != 2 || shape[1] != self.in_features {
            return Err(GradError::ShapeMismatch {
                context: "linear input [batch, in_features]",
                expected: vec![shape.first().copied().unwrap_or(0), self.in_features],
                actual: shape.to_vec(),
            });
        }

        let weight_t = engine.apply_operation(Box::new(Transpose::new()), vec![self.weight.id()])?;
        let output = engine.apply_operation(Box::new(MatMul), vec![input, weight_t])?;

        match &self.bias {
            // [batch, out] + [out] broadcasts over the batch
            Some(bias) => engine.apply_operation(Box::new(Add), vec![output, bias.id()]),
            None => Ok(output),
        }
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = vec![(self.weight.name().to_string(), &self.weight)];
        if let Some(bias) = &self.bias {
            params.push((bias.name().to_string(), bias));
        }
        params
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
