// src/dataset/mod.rs
// In-memory datasets and mini-batching

pub mod synthetic;

pub use synthetic::{synthetic_images, synthetic_regression};

use crate::error::{GradError, Result};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use rand::Rng;
use rand::seq::SliceRandom;

pub trait Dataset<T>
where
    T: GradFloat,
{
    /// Get a single sample by index. Both tensors keep a leading axis of size 1.
    fn get_item(&self, index: usize) -> Result<(Tensor<T>, Tensor<T>)>;

    /// Total number of samples in the dataset
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Basic tensor dataset for supervised learning
#[derive(Debug, Clone)]
pub struct TensorDataset<T>
where
    T: GradFloat,
{
    /// Input tensors - shape: [num_samples, *input_dims]
    inputs: Tensor<T>,
    /// Target tensors - shape: [num_samples, *target_dims]
    targets: Tensor<T>,
    num_samples: usize,
}

impl<T> TensorDataset<T>
where
    T: GradFloat,
{
    /// Pairs inputs with targets. Both need the same leading (sample) dimension.
    pub fn new(inputs: Tensor<T>, targets: Tensor<T>) -> Result<Self> {
        if inputs.ndim() == 0 || targets.ndim() == 0 {
            return Err(GradError::InvalidArgument(
                "dataset tensors need a leading sample dimension".into(),
            ));
        }
        if inputs.shape()[0] != targets.shape()[0] {
            return Err(GradError::shape_mismatch(
                "dataset targets",
                &[inputs.shape()[0]],
                &[targets.shape()[0]],
            ));
        }
        let num_samples = inputs.shape()[0];
        Ok(Self {
            inputs,
            targets,
            num_samples,
        })
    }

    pub fn inputs(&self) -> &Tensor<T> {
        &self.inputs
    }

    pub fn targets(&self) -> &Tensor<T> {
        &self.targets
    }

    /// Splits the dataset into consecutive batches of `batch_size` samples.
    /// The last batch may be smaller unless `drop_last` is set.
    pub fn batches(&self, batch_size: usize, drop_last: bool) -> Result<BatchedDataset<T>> {
        let indices: Vec<usize> = (0..self.num_samples).collect();
        self.batches_from_indices(&indices, batch_size, drop_last)
    }

    /// Same as [`TensorDataset::batches`] after shuffling the sample order with `rng`.
    pub fn shuffled_batches<R>(
        &self,
        batch_size: usize,
        drop_last: bool,
        rng: &mut R,
    ) -> Result<BatchedDataset<T>>
    where
        R: Rng + ?Sized,
    {
        let mut indices: Vec<usize> = (0..self.num_samples).collect();
        indices.shuffle(rng);
        self.batches_from_indices(&indices, batch_size, drop_last)
    }

    fn batches_from_indices(
        &self,
        indices: &[usize],
        batch_size: usize,
        drop_last: bool,
    ) -> Result<BatchedDataset<T>> {
        if batch_size == 0 {
            return Err(GradError::InvalidArgument(
                "batch size must be greater than 0".into(),
            ));
        }

        let mut input_batches = Vec::new();
        let mut target_batches = Vec::new();
        for chunk in indices.chunks(batch_size) {
            if drop_last && chunk.len() < batch_size {
                break;
            }
            input_batches.push(self.inputs.select_rows(chunk)?);
            target_batches.push(self.targets.select_rows(chunk)?);
        }
        Ok(BatchedDataset::new(input_batches, target_batches))
    }
}

impl<T> Dataset<T> for TensorDataset<T>
where
    T: GradFloat,
{
    fn get_item(&self, index: usize) -> Result<(Tensor<T>, Tensor<T>)> {
        Ok((
            self.inputs.select_rows(&[index])?,
            self.targets.select_rows(&[index])?,
        ))
    }

    fn len(&self) -> usize {
        self.num_samples
    }
}

/// Pre-computed (input, target) batches.
#[derive(Debug, Clone)]
pub struct BatchedDataset<T>
where
    T: GradFloat,
{
    input_batches: Vec<Tensor<T>>,
    target_batches: Vec<Tensor<T>>,
}

impl<T> BatchedDataset<T>
where
    T: GradFloat,
{
    fn new(input_batches: Vec<Tensor<T>>, target_batches: Vec<Tensor<T>>) -> Self {
        Self {
            input_batches,
            target_batches,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tensor<T>, &Tensor<T>)> {
        self.input_batches.iter().zip(self.target_batches.iter())
    }
}

impl<T> Dataset<T> for BatchedDataset<T>
where
    T: GradFloat,
{
    /// Returns the whole batch at `index`.
    fn get_item(&self, index: usize) -> Result<(Tensor<T>, Tensor<T>)> {
        match (self.input_batches.get(index), self.target_batches.get(index)) {
            (Some(input), Some(target)) => Ok((input.clone(), target.clone())),
            _ => Err(GradError::InvalidArgument(format!(
                "batch index {index} out of range for {} batches",
                self.len()
            ))),
        }
    }

    // Number of batches
    fn len(&self) -> usize {
        self.input_batches.len()
    }
}

impl<T> IntoIterator for BatchedDataset<T>
where
    T: GradFloat,
{
    type Item = (Tensor<T>, Tensor<T>);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<Tensor<T>>, std::vec::IntoIter<Tensor<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.input_batches.into_iter().zip(self.target_batches)
    }
}

impl<'a, T> IntoIterator for &'a BatchedDataset<T>
where
    T: GradFloat,
{
    type Item = (&'a Tensor<T>, &'a Tensor<T>);
    type IntoIter =
        std::iter::Zip<std::slice::Iter<'a, Tensor<T>>, std::slice::Iter<'a, Tensor<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.input_batches.iter().zip(self.target_batches.iter())
    }
}
