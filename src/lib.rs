//! # ferrograd
//!
//! ferrograd is a small, CPU-based reverse-mode automatic differentiation engine
//! written in Rust, in the spirit of PyTorch's autograd.
//!
//! ## Features
//!
//! - Eager tensors on top of `ndarray`, with numpy-style broadcasting
//! - Dynamic computation graph recorded in an arena [`Engine`]
//! - Gradient accumulation across backward passes
//! - Grad mode switching (`no_grad`) and graph detaching
//! - Graph visualization as GraphViz DOT
//! - Neural network modules, losses and optimizers (SGD, Adam)
//! - Written 100% in safe Rust
//!
//! ## Example
//!
//! ```rust
//! use ferrograd::{Engine, Tensor};
//!
//! # fn main() -> ferrograd::Result<()> {
//! let mut engine = Engine::<f32>::new();
//! let x = engine.variable(Tensor::ones(&[2, 2]));
//! let y = engine.add_scalar(x, 2.0)?;
//! let z = engine.mul(y, y)?;
//! let z = engine.mul_scalar(z, 3.0)?;
//! let out = engine.mean(z, None, false)?;
//!
//! engine.backward(out)?;
//! let grad = engine.grad(x)?.expect("x requires grad");
//! assert!(grad.to_vec().iter().all(|&g| (g - 4.5).abs() < 1e-6));
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod error;
pub mod graph;
pub mod nn;
pub mod number;
pub mod ops;
pub mod tensor;
pub mod training;

// Re-export commonly used types for convenience
pub use error::{GradError, Result};
pub use graph::{Engine, NodeId};
pub use number::GradFloat;
pub use tensor::Tensor;
