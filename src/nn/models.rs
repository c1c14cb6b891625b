// src/nn/models.rs
// Ready-made networks built from the layers in `nn::layers`

use crate::error::Result;
use crate::graph::{Engine, NodeId};
use crate::nn::layers::{Conv2d, Flatten, Linear, MaxPool2d, ReLU};
use crate::nn::module::{Module, Sequential, prefixed};
use crate::nn::parameter::Parameter;
use crate::number::GradFloat;
use rand::Rng;

/// Linear -> ReLU -> Linear.
///
/// Parameters are named `fc1.weight`, `fc1.bias`, `fc2.weight`, `fc2.bias`.
#[derive(Debug, Clone)]
pub struct TwoLayerNet {
    pub fc1: Linear,
    pub fc2: Linear,
    activation: ReLU,
    training: bool,
}

impl TwoLayerNet {
    pub fn new<T: GradFloat>(
        engine: &mut Engine<T>,
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
    ) -> Result<Self> {
        Self::new_with_rng(engine, input_size, hidden_size, output_size, &mut rand::rng())
    }

    pub fn new_with_rng<T, R>(
        engine: &mut Engine<T>,
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Result<Self>
    where
        T: GradFloat,
        R: Rng + ?Sized,
    {
        Ok(Self {
            fc1: Linear::new_with_rng(engine, input_size, hidden_size, true, rng)?,
            fc2: Linear::new_with_rng(engine, hidden_size, output_size, true, rng)?,
            activation: ReLU::new(),
            training: true,
        })
    }
}

impl<T> Module<T> for TwoLayerNet
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        let hidden = self.fc1.forward(engine, input)?;
        let hidden = self.activation.forward(engine, hidden)?;
        self.fc2.forward(engine, hidden)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = prefixed("fc1", Module::<T>::named_parameters(&self.fc1));
        params.extend(prefixed("fc2", Module::<T>::named_parameters(&self.fc2)));
        params
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        Module::<T>::set_training(&mut self.fc1, training);
        Module::<T>::set_training(&mut self.fc2, training);
        Module::<T>::set_training(&mut self.activation, training);
    }
}

/// LeNet-5 style classifier for single-channel 32x32 images.
///
/// ```text
/// features:   conv(1->6, k5) relu pool2  conv(6->16, k5) relu pool2
/// classifier: flatten  linear(400->120) relu  linear(120->84) relu  linear(84->classes)
/// ```
///
/// Input shape: [batch, 1, 32, 32]. Output: logits [batch, num_classes].
pub struct LeNet<T = f32>
where
    T: GradFloat,
{
    pub features: Sequential<T>,
    pub classifier: Sequential<T>,
    pub num_classes: usize,
    training: bool,
}

impl<T> std::fmt::Debug for LeNet<T>
where
    T: GradFloat,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeNet")
            .field("num_classes", &self.num_classes)
            .field("training", &self.training)
            .finish()
    }
}

impl<T> LeNet<T>
where
    T: GradFloat,
{
    pub const INPUT_SIZE: usize = 32;

    pub fn new(engine: &mut Engine<T>, num_classes: usize) -> Result<Self> {
        Self::new_with_rng(engine, num_classes, &mut rand::rng())
    }

    pub fn new_with_rng<R>(engine: &mut Engine<T>, num_classes: usize, rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        let features = Sequential::new()
            .with(Conv2d::new_with_rng(engine, 1, 6, 5, 1, 0, rng)?)
            .with(ReLU::new())
            .with(MaxPool2d::new(2))
            .with(Conv2d::new_with_rng(engine, 6, 16, 5, 1, 0, rng)?)
            .with(ReLU::new())
            .with(MaxPool2d::new(2));

        // 32 -> 28 -> 14 -> 10 -> 5
        let classifier = Sequential::new()
            .with(Flatten::new())
            .with(Linear::new_with_rng(engine, 16 * 5 * 5, 120, true, rng)?)
            .with(ReLU::new())
            .with(Linear::new_with_rng(engine, 120, 84, true, rng)?)
            .with(ReLU::new())
            .with(Linear::new_with_rng(engine, 84, num_classes, true, rng)?);

        Ok(Self {
            features,
            classifier,
            num_classes,
            training: true,
        })
    }
}

impl<T> Module<T> for LeNet<T>
where
    T: GradFloat,
{
    fn forward(&self, engine: &mut Engine<T>, input: NodeId) -> Result<NodeId> {
        let features = self.features.forward(engine, input)?;
        self.classifier.forward(engine, features)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = prefixed("features", self.features.named_parameters());
        params.extend(prefixed("classifier", self.classifier.named_parameters()));
        params
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.features.set_training(training);
        self.classifier.set_training(training);
    }
}
