// Neural Network Module for ferrograd
// This module provides high-level building blocks for constructing neural networks
// on top of the automatic differentiation engine.

pub mod initializers;
pub mod layers;
pub mod losses;
pub mod models;
pub mod module;
pub mod optim;
pub mod parameter;

// Re-export the main types and traits for convenience
pub use layers::{Conv2d, Flatten, Linear, MaxPool2d, ReLU, Sigmoid, Tanh};
pub use losses::{CrossEntropyLoss, L1Loss, Loss, MSELoss, Reduction};
pub use models::{LeNet, TwoLayerNet};
pub use module::{Module, Sequential, StateDict};
pub use optim::{Adam, Optimizer, SGD, clip_grad_norm};
pub use parameter::Parameter;
pub use initializers::Init;
