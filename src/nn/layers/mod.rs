// src/nn/layers/mod.rs
// Module declaration and basic usage test for neural network layers

pub mod activation;
pub mod conv2d;
pub mod linear;
pub mod pooling;

// Re-export commonly used layers for convenience
pub use activation::{ReLU, Sigmoid, Tanh};
pub use conv2d::Conv2d;
pub use linear::Linear;
pub use pooling::{Flatten, MaxPool2d};
