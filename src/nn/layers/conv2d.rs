// src/nn/layers/conv2d.rs
// 2D convolutional layer over NCHW batches

use crate::error::{GradError, Result};
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::nn::initializers::Init;
use crate::nn::parameter::Parameter;
use crate::number::GradFloat;
use crate::ops::{Add, Convolution2d, Reshape};
use crate::tensor::Tensor;
use rand::Rng;

/// 2D convolution layer with square kernels.
/// Weight shape: [out_channels, in_channels, kernel_size, kernel_size]
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub weight: Parameter,
    pub bias: Option<Parameter>,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    training: bool,
}

impl Conv2d {
    /// Kaiming uniform weights and zero bias, stride 1, no padding.
    pub fn new<T: GradFloat>(
        engine: &mut Engine<T>,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
    ) -> Result<Self> {
        Self::new_with_rng(engine, in_channels, out_channels, kernel_size, 1, 0, &mut rand::rng())
    }

    pub fn new_with_rng<T, R>(
        engine: &mut Engine<T>,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        rng: &mut R,
    ) -> Result<Self>
    where
        T: GradFloat,
        R: Rng + ?Sized,
    {
        if kernel_size == 0 || stride == 0 {
            return Err(GradError::InvalidArgument(
                "conv2d kernel size and stride must be positive".into(),
            ));
        }
        let weight: Tensor<T> =
            Init::KaimingUniform.tensor(&[out_channels, in_channels, kernel_size, kernel_size], rng)?;

        Ok(Self {
            weight: Parameter::new(engine, weight, "weight"),
            bias: Some(Parameter::new(engine, Tensor::zeros(&[out_channels]), "bias")),
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            training: true,
        })
    }

    /// Spatial output size for an input of `size` pixels along one axis.
    pub fn output_size(&self, size: usize) -> usize {
        (size + 2 * self.padding).saturating_sub(self.kernel_size) / self.stride + 1
    }
}

impl<T> Module<T> for Conv2d
where
    T: GradFloat,
{
    /// Input shape: [batch_size, in_channels, height, width]
    /// Output shape: [batch_size, out_channels, out_height, out_width]
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        let shape = engine.data(input)?.shape();
        if shape.len() != 4 {
            return Err(GradError::InvalidArgument(format!(
                "Conv2d requires 4D input [batch, channels, height, width], got shape {shape:?}"
            )));
        }
        if shape[1] != self.in_channels {
            return Err(GradError::shape_mismatch(
                "conv2d input channels",
                &[self.in_channels],
                &[shape[1]],
            ));
        }

        let conv = Convolution2d::new(self.stride, self.padding);
        let output = engine.apply_operation(Box::new(conv), vec![input, self.weight.id()])?;

        match &self.bias {
            Some(bias) => {
                // [O] -> [1, O, 1, 1] so it broadcasts over batch and space
                let reshape = Reshape::new(vec![1, self.out_channels, 1, 1]);
                let bias = engine.apply_operation(Box::new(reshape), vec![bias.id()])?;
                engine.apply_operation(Box::new(Add), vec![output, bias])
            }
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
