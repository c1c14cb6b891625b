// src/training/mod.rs
// The training iteration: forward -> loss -> zero_grad -> backward -> step,
// plus the epoch loop and no-grad evaluation built on it.

pub mod config;

pub use config::{OptimizerKind, TrainingConfig};

use crate::dataset::{Dataset, TensorDataset};
use crate::error::{GradError, Result};
use crate::graph::Engine;
use crate::nn::optim::{Optimizer, clip_grad_norm};
use crate::nn::{Loss, Module};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Runs one optimization step on a single batch and returns the loss value.
///
/// Gradients of the optimizer's parameters are zeroed before backward, and every
/// non-parameter node is dropped from the engine afterwards. A non-finite loss is
/// logged and the step still runs.
pub fn train_step<T, M, L, O>(
    engine: &mut Engine<T>,
    model: &M,
    loss_fn: &L,
    optimizer: &mut O,
    inputs: &Tensor<T>,
    targets: &Tensor<T>,
    max_grad_norm: Option<T>,
) -> Result<T>
where
    T: GradFloat,
    M: Module<T> + ?Sized,
    L: Loss<T> + ?Sized,
    O: Optimizer<T> + ?Sized,
{
    let input = engine.constant(inputs.clone());
    let target = engine.constant(targets.clone());

    let predictions = model.forward(engine, input)?;
    let loss = loss_fn.forward(engine, predictions, target)?;
    let loss_value = engine.data(loss)?.item()?;
    if !loss_value.is_finite() {
        warn!("non-finite loss {loss_value}, gradients will not be meaningful");
    }

    optimizer.zero_grad(engine)?;
    engine.backward(loss)?;
    if let Some(max_norm) = max_grad_norm {
        let norm = clip_grad_norm(engine, optimizer.params(), max_norm)?;
        debug!("gradient norm before clipping: {norm}");
    }
    optimizer.step(engine)?;
    engine.clear_graph();

    Ok(loss_value)
}

/// Per-epoch mean training losses.
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory<T> {
    pub epoch_losses: Vec<T>,
}

impl<T> TrainingHistory<T>
where
    T: GradFloat,
{
    pub fn last_loss(&self) -> Option<T> {
        self.epoch_losses.last().copied()
    }
}

/// Trains `model` on `dataset` for `config.num_epochs` epochs.
///
/// The optimizer is built from the config over `model.parameter_ids()`. Batches
/// are reshuffled every epoch with an rng seeded from `config.seed`.
pub fn fit<T, M, L>(
    engine: &mut Engine<T>,
    model: &mut M,
    loss_fn: &L,
    dataset: &TensorDataset<T>,
    config: &TrainingConfig<T>,
) -> Result<TrainingHistory<T>>
where
    T: GradFloat,
    M: Module<T> + ?Sized,
    L: Loss<T> + ?Sized,
{
    if dataset.is_empty() {
        return Err(GradError::InvalidArgument("cannot train on an empty dataset".into()));
    }

    let mut optimizer = config.build_optimizer(model.parameter_ids());
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut history = TrainingHistory {
        epoch_losses: Vec::with_capacity(config.num_epochs),
    };
    model.train();

    for epoch in 0..config.num_epochs {
        let batches = if config.shuffle {
            dataset.shuffled_batches(config.batch_size, false, &mut rng)?
        } else {
            dataset.batches(config.batch_size, false)?
        };

        let mut total = T::zero();
        for (inputs, targets) in &batches {
            let loss = train_step(
                engine,
                &*model,
                loss_fn,
                optimizer.as_mut(),
                inputs,
                targets,
                config.max_grad_norm,
            )?;
            total += loss * T::from_usize_lossy(inputs.shape()[0]);
        }
        let epoch_loss = total / T::from_usize_lossy(dataset.len());
        history.epoch_losses.push(epoch_loss);

        if !epoch_loss.is_finite() {
            warn!("[EPOCH {epoch}] loss is {epoch_loss}, training is unstable");
        } else if config.print_every > 0
            && (epoch % config.print_every == 0 || epoch + 1 == config.num_epochs)
        {
            info!("[EPOCH {epoch}] Loss: {epoch_loss:.6}");
        }
    }

    Ok(history)
}

/// Mean loss over `dataset`, computed without recording a graph.
pub fn evaluate<T, M, L>(
    engine: &mut Engine<T>,
    model: &M,
    loss_fn: &L,
    dataset: &TensorDataset<T>,
    batch_size: usize,
) -> Result<T>
where
    T: GradFloat,
    M: Module<T> + ?Sized,
    L: Loss<T> + ?Sized,
{
    if dataset.is_empty() {
        return Err(GradError::InvalidArgument("cannot evaluate an empty dataset".into()));
    }
    let batches = dataset.batches(batch_size, false)?;

    let total = engine.no_grad(|engine| -> Result<T> {
        let mut total = T::zero();
        for (inputs, targets) in &batches {
            let input = engine.constant(inputs.clone());
            let target = engine.constant(targets.clone());
            let predictions = model.forward(engine, input)?;
            let loss = loss_fn.forward(engine, predictions, target)?;
            total += engine.data(loss)?.item()? * T::from_usize_lossy(inputs.shape()[0]);
            engine.clear_graph();
        }
        Ok(total)
    })?;

    Ok(total / T::from_usize_lossy(dataset.len()))
}

/// Fraction of samples whose arg-max logit equals the class-index target.
pub fn accuracy<T, M>(
    engine: &mut Engine<T>,
    model: &M,
    dataset: &TensorDataset<T>,
    batch_size: usize,
) -> Result<f64>
where
    T: GradFloat,
    M: Module<T> + ?Sized,
{
    if dataset.is_empty() {
        return Err(GradError::InvalidArgument("cannot score an empty dataset".into()));
    }
    let batches = dataset.batches(batch_size, false)?;

    let correct = engine.no_grad(|engine| -> Result<usize> {
        let mut correct = 0;
        for (inputs, targets) in &batches {
            let input = engine.constant(inputs.clone());
            let logits = model.forward(engine, input)?;
            let predicted = engine.data(logits)?.argmax_last()?;
            correct += predicted
                .iter()
                .zip(targets.to_vec())
                .filter(|&(&p, t)| t.to_f64_lossy() == p as f64)
                .count();
            engine.clear_graph();
        }
        Ok(correct)
    })?;

    Ok(correct as f64 / dataset.len() as f64)
}
