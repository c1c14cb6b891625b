// src/training/config.rs
// Hyperparameters for the training loop and optimizer selection

use crate::graph::NodeId;
use crate::nn::optim::{Adam, Optimizer, SGD};
use crate::number::GradFloat;

/// Which update rule `build_optimizer` constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    SGD,
    Adam,
}

/// Training configuration supporting multiple optimizers
#[derive(Debug, Clone)]
pub struct TrainingConfig<T>
where
    T: GradFloat,
{
    // Common training parameters
    pub batch_size: usize,
    pub num_epochs: usize,
    pub learning_rate: T,
    /// Log the epoch loss every `print_every` epochs (and on the last one)
    pub print_every: usize,
    pub shuffle: bool,
    /// Seed for the batch shuffling rng
    pub seed: u64,
    /// Global gradient norm limit applied before every step
    pub max_grad_norm: Option<T>,

    pub optimizer: OptimizerKind,
    pub weight_decay: T,

    // SGD-specific parameters
    pub momentum: T,
    pub nesterov: bool,

    // Adam-specific parameters
    pub beta1: T,
    pub beta2: T,
    pub eps: T,
    pub amsgrad: bool,
}

impl<T> TrainingConfig<T>
where
    T: GradFloat,
{
    /// Default configuration for stable training
    pub fn default_stable() -> Self {
        Self {
            batch_size: 32,
            num_epochs: 100,
            learning_rate: T::from_f64_lossy(1e-4),
            print_every: 10,
            shuffle: true,
            seed: 42,
            max_grad_norm: None,

            optimizer: OptimizerKind::Adam,
            weight_decay: T::from_f64_lossy(1e-4),

            momentum: T::from_f64_lossy(0.9),
            nesterov: false,

            beta1: T::from_f64_lossy(0.9),
            beta2: T::from_f64_lossy(0.999),
            eps: T::from_f64_lossy(1e-8),
            amsgrad: false,
        }
    }

    /// Fast training configuration for quick testing
    pub fn fast() -> Self {
        Self {
            batch_size: 100,
            num_epochs: 50,
            learning_rate: T::from_f64_lossy(1e-3),
            print_every: 5,
            ..Self::default_stable()
        }
    }

    /// SGD with Nesterov momentum
    pub fn sgd(learning_rate: T) -> Self {
        Self {
            learning_rate,
            optimizer: OptimizerKind::SGD,
            nesterov: true,
            ..Self::default_stable()
        }
    }

    pub fn with_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builds the configured optimizer over `params`.
    pub fn build_optimizer(&self, params: Vec<NodeId>) -> Box<dyn Optimizer<T>> {
        match self.optimizer {
            OptimizerKind::SGD => Box::new(
                SGD::new(params, self.learning_rate)
                    .with_momentum(self.momentum)
                    .with_nesterov(self.nesterov)
                    .with_weight_decay(self.weight_decay),
            ),
            OptimizerKind::Adam => Box::new(
                Adam::new(params, self.learning_rate)
                    .with_betas(self.beta1, self.beta2)
                    .with_eps(self.eps)
                    .with_weight_decay(self.weight_decay)
                    .with_amsgrad(self.amsgrad),
            ),
        }
    }
}

impl<T> Default for TrainingConfig<T>
where
    T: GradFloat,
{
    fn default() -> Self {
        Self::default_stable()
    }
}
