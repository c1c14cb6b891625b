// src/dataset/synthetic.rs
// Seeded synthetic data for demos and tests

use super::TensorDataset;
use crate::error::{GradError, Result};
use crate::number::GradFloat;
use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Regression data with a fixed random linear target:
/// `y = x @ W + noise`, with `x ~ N(0, 1)` of shape [n, in_features] and
/// `W ~ N(0, 1)` of shape [in_features, out_features].
pub fn synthetic_regression<T, R>(
    num_samples: usize,
    in_features: usize,
    out_features: usize,
    noise: f64,
    rng: &mut R,
) -> Result<TensorDataset<T>>
where
    T: GradFloat,
    R: Rng + ?Sized,
{
    let inputs: Tensor<T> = Tensor::randn(&[num_samples, in_features], 0.0, 1.0, rng)?;
    let weights: Tensor<T> = Tensor::randn(&[in_features, out_features], 0.0, 1.0, rng)?;
    let mut targets = inputs.matmul(&weights)?;
    if noise > 0.0 {
        let jitter = Tensor::randn(targets.shape(), 0.0, noise, rng)?;
        targets.accumulate(&jitter)?;
    }
    TensorDataset::new(inputs, targets)
}

/// Single-channel 32x32 images whose class decides where a bright square sits.
///
/// The image is split into a grid with one cell per class; class `c` lights up
/// the centre of cell `c`. Gaussian noise with std `noise` is added everywhere.
/// Returns inputs [n, 1, 32, 32] and class-index targets [n].
pub fn synthetic_images<T, R>(
    num_samples: usize,
    num_classes: usize,
    noise: f64,
    rng: &mut R,
) -> Result<TensorDataset<T>>
where
    T: GradFloat,
    R: Rng + ?Sized,
{
    const SIZE: usize = 32;
    if num_classes == 0 || num_classes > 16 {
        return Err(GradError::InvalidArgument(format!(
            "synthetic images support 1 to 16 classes, got {num_classes}"
        )));
    }
    let normal = Normal::new(0.0, noise.max(0.0))
        .map_err(|e| GradError::InvalidArgument(format!("normal distribution: {e}")))?;

    let side = (1..).find(|s| s * s >= num_classes).unwrap_or(num_classes);
    let cell = SIZE / side;
    let half = (cell / 4).max(1);

    let mut pixels = Vec::with_capacity(num_samples * SIZE * SIZE);
    let mut labels = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let class = rng.random_range(0..num_classes);
        let (cy, cx) = ((class / side) * cell + cell / 2, (class % side) * cell + cell / 2);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let lit = y.abs_diff(cy) < half && x.abs_diff(cx) < half;
                let base = if lit { 1.0 } else { 0.0 };
                pixels.push(T::from_f64_lossy(base + normal.sample(rng)));
            }
        }
        labels.push(T::from_usize_lossy(class));
    }

    let inputs = Tensor::from_vec(pixels, &[num_samples, 1, SIZE, SIZE])?;
    let targets = Tensor::from_vec(labels, &[num_samples])?;
    TensorDataset::new(inputs, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_regression_shapes_and_determinism() {
        let a: TensorDataset<f64> =
            synthetic_regression(20, 3, 2, 0.1, &mut StdRng::seed_from_u64(1)).unwrap();
        let b: TensorDataset<f64> =
            synthetic_regression(20, 3, 2, 0.1, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a.inputs().shape(), &[20, 3]);
        assert_eq!(a.targets().shape(), &[20, 2]);
        assert_eq!(a.targets(), b.targets());
    }

    #[test]
    fn test_images_without_noise_are_binary_squares() {
        let data: TensorDataset<f32> =
            synthetic_images(6, 4, 0.0, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(data.len(), 6);
        assert_eq!(data.inputs().shape(), &[6, 1, 32, 32]);

        let labels = data.targets().to_vec();
        assert!(labels.iter().all(|&c| (0.0..4.0).contains(&c) && c.fract() == 0.0));

        let (image, _) = data.get_item(0).unwrap();
        let lit = image.to_vec().iter().filter(|&&p| p == 1.0).count();
        // 4 classes -> 2x2 grid of 16px cells, square of side 2 * 4 - 1
        assert_eq!(lit, 49);
    }

    #[test]
    fn test_images_reject_class_counts() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(synthetic_images::<f32, _>(1, 0, 0.1, &mut rng).is_err());
        assert!(synthetic_images::<f32, _>(1, 17, 0.1, &mut rng).is_err());
    }
}
