// src/tensor/mod.rs
// Dense n-dimensional tensor backed by ndarray.
// Every differentiable operator is written in terms of the methods below.

mod conv;

use crate::error::{GradError, Result};
use crate::number::GradFloat;
use ndarray::{Array, Array2, ArrayD, Axis, Ix2, IxDyn, Zip};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use std::fmt;

/// Strided n-dimensional numeric buffer.
///
/// Operations return new tensors. The few in-place methods (`accumulate`,
/// `scaled_add`, `fill`, `map_inplace`) say so in their name or docs and are the
/// only way a tensor's contents change.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T = f32>
where
    T: GradFloat,
{
    data: ArrayD<T>,
}

/// Shape obtained by broadcasting `lhs` against `rhs` (numpy rules).
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let mut shape = vec![0; ndim];
    for i in 0..ndim {
        // Align from the trailing dimension
        let l = if i < ndim - lhs.len() { 1 } else { lhs[i - (ndim - lhs.len())] };
        let r = if i < ndim - rhs.len() { 1 } else { rhs[i - (ndim - rhs.len())] };
        shape[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => {
                return Err(GradError::Broadcast {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                });
            }
        };
    }
    Ok(shape)
}

impl<T> Tensor<T>
where
    T: GradFloat,
{
    pub fn new(data: ArrayD<T>) -> Self {
        Self { data }
    }

    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GradError::DataLength {
                len: data.len(),
                shape: shape.to_vec(),
                expected,
            });
        }
        Ok(Self::new(Array::from_shape_vec(IxDyn(shape), data)?))
    }

    /// 0-dimensional tensor holding a single value.
    pub fn scalar(value: T) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(ArrayD::zeros(IxDyn(shape)))
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::new(ArrayD::ones(IxDyn(shape)))
    }

    pub fn full(shape: &[usize], value: T) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(shape), value))
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape())
    }

    pub fn ones_like(&self) -> Self {
        Self::ones(self.shape())
    }

    /// Samples every element from N(mean, std).
    pub fn randn<R>(shape: &[usize], mean: f64, std: f64, rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        if !(std >= 0.0) || !std.is_finite() {
            return Err(GradError::InvalidArgument(format!(
                "normal distribution needs a finite, non-negative std, got {std}"
            )));
        }
        let normal = Normal::new(mean, std)
            .map_err(|e| GradError::InvalidArgument(format!("normal distribution: {e}")))?;
        Ok(Self::from_fn(shape, || T::from_f64_lossy(normal.sample(&mut *rng))))
    }

    /// Samples every element from U(low, high).
    pub fn rand_uniform<R>(shape: &[usize], low: f64, high: f64, rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        let uniform = Uniform::new(low, high)
            .map_err(|e| GradError::InvalidArgument(format!("uniform distribution: {e}")))?;
        Ok(Self::from_fn(shape, || T::from_f64_lossy(uniform.sample(&mut *rng))))
    }

    /// Fills a tensor of the given shape by calling `f` once per element, in row-major order.
    pub fn from_fn<F>(shape: &[usize], mut f: F) -> Self
    where
        F: FnMut() -> T,
    {
        Self::new(ArrayD::from_shape_simple_fn(IxDyn(shape), &mut f))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }

    /// Elements in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().copied().collect()
    }

    pub fn first(&self) -> Result<T> {
        self.data
            .iter()
            .next()
            .copied()
            .ok_or_else(|| GradError::InvalidArgument("empty tensor has no first element".into()))
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Result<T> {
        if self.size() != 1 {
            return Err(GradError::shape_mismatch("item", &[1], self.shape()));
        }
        self.first()
    }

    // ELEMENTWISE OPERATIONS

    fn zip_broadcast<F>(&self, other: &Tensor<T>, f: F) -> Result<Tensor<T>>
    where
        F: Fn(T, T) -> T,
    {
        let shape = broadcast_shape(self.shape(), other.shape())?;
        let broadcast_err = || GradError::Broadcast {
            lhs: self.shape().to_vec(),
            rhs: other.shape().to_vec(),
        };
        let lhs = self.data.broadcast(shape.as_slice()).ok_or_else(broadcast_err)?;
        let rhs = other.data.broadcast(shape.as_slice()).ok_or_else(broadcast_err)?;
        let data = Zip::from(&lhs).and(&rhs).map_collect(|&a, &b| f(a, b));
        Ok(Tensor::new(data))
    }

    pub fn add(&self, other: &Tensor<T>) -> Result<Tensor<T>> {
        self.zip_broadcast(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Tensor<T>) -> Result<Tensor<T>> {
        self.zip_broadcast(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Tensor<T>) -> Result<Tensor<T>> {
        self.zip_broadcast(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Tensor<T>) -> Result<Tensor<T>> {
        self.zip_broadcast(other, |a, b| a / b)
    }

    /// Applies `f` to every element.
    pub fn map<F>(&self, f: F) -> Tensor<T>
    where
        F: Fn(T) -> T,
    {
        Tensor::new(self.data.mapv(f))
    }

    pub fn neg(&self) -> Tensor<T> {
        self.map(|x| -x)
    }

    pub fn add_scalar(&self, scalar: T) -> Tensor<T> {
        self.map(|x| x + scalar)
    }

    pub fn mul_scalar(&self, scalar: T) -> Tensor<T> {
        self.map(|x| x * scalar)
    }

    pub fn div_scalar(&self, scalar: T) -> Tensor<T> {
        self.map(|x| x / scalar)
    }

    pub fn powf(&self, exponent: T) -> Tensor<T> {
        self.map(|x| x.powf(exponent))
    }

    pub fn exp(&self) -> Tensor<T> {
        self.map(|x| x.exp())
    }

    pub fn ln(&self) -> Tensor<T> {
        self.map(|x| x.ln())
    }

    pub fn sqrt(&self) -> Tensor<T> {
        self.map(|x| x.sqrt())
    }

    pub fn abs(&self) -> Tensor<T> {
        self.map(|x| x.abs())
    }

    /// -1, 0 or 1 per element (0 maps to 0, unlike `f32::signum`).
    pub fn sign(&self) -> Tensor<T> {
        self.map(|x| {
            if x > T::zero() {
                T::one()
            } else if x < T::zero() {
                -T::one()
            } else {
                T::zero()
            }
        })
    }

    pub fn relu(&self) -> Tensor<T> {
        self.map(|x| if x > T::zero() { x } else { T::zero() })
    }

    /// 1 where the element is strictly positive, 0 elsewhere.
    pub fn positive_mask(&self) -> Tensor<T> {
        self.map(|x| if x > T::zero() { T::one() } else { T::zero() })
    }

    pub fn sigmoid(&self) -> Tensor<T> {
        self.map(|x| T::one() / (T::one() + (-x).exp()))
    }

    pub fn tanh(&self) -> Tensor<T> {
        self.map(|x| x.tanh())
    }

    // LINEAR ALGEBRA

    /// Matrix product of two 2-D tensors.
    pub fn matmul(&self, other: &Tensor<T>) -> Result<Tensor<T>> {
        if self.ndim() != 2 || other.ndim() != 2 {
            return Err(GradError::InvalidArgument(format!(
                "matmul requires 2-D tensors, got {:?} and {:?}",
                self.shape(),
                other.shape()
            )));
        }
        if self.shape()[1] != other.shape()[0] {
            return Err(GradError::ShapeMismatch {
                context: "matmul inner dimension",
                expected: vec![self.shape()[1]],
                actual: vec![other.shape()[0]],
            });
        }
        let lhs = self.data.view().into_dimensionality::<Ix2>()?;
        let rhs = other.data.view().into_dimensionality::<Ix2>()?;
        Ok(Tensor::new(lhs.dot(&rhs).into_dyn()))
    }

    /// Permutes the axes. `None` reverses them (plain matrix transpose for 2-D).
    pub fn transpose(&self, axes: Option<&[usize]>) -> Result<Tensor<T>> {
        let permuted = match axes {
            None => self.data.t().as_standard_layout().into_owned(),
            Some(axes) => {
                validate_permutation(axes, self.ndim())?;
                self.data
                    .view()
                    .permuted_axes(axes.to_vec())
                    .as_standard_layout()
                    .into_owned()
            }
        };
        Ok(Tensor::new(permuted))
    }

    // SHAPE MANIPULATION

    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor<T>> {
        let expected: usize = shape.iter().product();
        if expected != self.size() {
            return Err(GradError::ShapeMismatch {
                context: "reshape element count",
                expected: shape.to_vec(),
                actual: self.shape().to_vec(),
            });
        }
        Tensor::from_vec(self.to_vec(), shape)
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Tensor<T>> {
        let view = self.data.broadcast(shape).ok_or_else(|| GradError::Broadcast {
            lhs: self.shape().to_vec(),
            rhs: shape.to_vec(),
        })?;
        Ok(Tensor::new(view.to_owned()))
    }

    /// Sums out the dimensions that broadcasting added or expanded so the result has `target` shape.
    /// This is how gradients flow back through a broadcast.
    pub fn reduce_to_shape(&self, target: &[usize]) -> Result<Tensor<T>> {
        if self.shape() == target {
            return Ok(self.clone());
        }
        let shape = self.shape();
        if shape.len() < target.len() {
            return Err(GradError::shape_mismatch("reduce_to_shape", target, shape));
        }

        let extra = shape.len() - target.len();
        let mut axes: Vec<usize> = (0..extra).collect();
        for (i, &dim) in target.iter().enumerate() {
            let current = shape[extra + i];
            if dim == 1 && current != 1 {
                axes.push(extra + i);
            } else if dim != current {
                return Err(GradError::shape_mismatch("reduce_to_shape", target, shape));
            }
        }

        let reduced = if axes.is_empty() {
            self.clone()
        } else {
            self.sum(Some(&axes), true)?
        };
        reduced.reshape(target)
    }

    /// Rows (along axis 0) at the given indices, in order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Tensor<T>> {
        if self.ndim() == 0 {
            return Err(GradError::InvalidArgument("cannot select rows of a scalar".into()));
        }
        let rows = self.shape()[0];
        if let Some(&bad) = indices.iter().find(|&&i| i >= rows) {
            return Err(GradError::InvalidArgument(format!(
                "row index {bad} out of range for {rows} rows"
            )));
        }
        Ok(Tensor::new(self.data.select(Axis(0), indices)))
    }

    // REDUCTIONS

    /// Sum over all elements (`None`) or over the listed axes.
    pub fn sum(&self, axes: Option<&[usize]>, keep_dims: bool) -> Result<Tensor<T>> {
        let axes = self.resolve_axes(axes)?;
        let mut data = self.data.clone();
        let mut sorted = axes.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        for &axis in &sorted {
            data = data.sum_axis(Axis(axis));
        }

        let reduced = Tensor::new(data);
        if keep_dims {
            let kept: Vec<usize> = self
                .shape()
                .iter()
                .enumerate()
                .map(|(i, &d)| if axes.contains(&i) { 1 } else { d })
                .collect();
            reduced.reshape(&kept)
        } else {
            Ok(reduced)
        }
    }

    pub fn mean(&self, axes: Option<&[usize]>, keep_dims: bool) -> Result<Tensor<T>> {
        let count = self.reduced_count(axes)?;
        let sum = self.sum(axes, keep_dims)?;
        Ok(sum.div_scalar(T::from_usize_lossy(count)))
    }

    /// Number of elements folded into each output element of a reduction.
    pub fn reduced_count(&self, axes: Option<&[usize]>) -> Result<usize> {
        let axes = self.resolve_axes(axes)?;
        Ok(axes.iter().map(|&a| self.shape()[a]).product())
    }

    pub fn max_axis(&self, axis: usize, keep_dims: bool) -> Result<Tensor<T>> {
        self.check_axis(axis)?;
        let max = self
            .data
            .fold_axis(Axis(axis), T::neg_infinity(), |&m, &x| if x > m { x } else { m });
        let reduced = Tensor::new(max);
        if keep_dims {
            let mut kept = self.shape().to_vec();
            kept[axis] = 1;
            reduced.reshape(&kept)
        } else {
            Ok(reduced)
        }
    }

    /// Index of the largest element along the last axis, one per lane.
    pub fn argmax_last(&self) -> Result<Vec<usize>> {
        if self.ndim() == 0 {
            return Err(GradError::InvalidArgument("argmax of a scalar".into()));
        }
        let last = Axis(self.ndim() - 1);
        Ok(self
            .data
            .lanes(last)
            .into_iter()
            .map(|lane| {
                let mut best = 0;
                for (i, &x) in lane.iter().enumerate() {
                    if x > lane[best] {
                        best = i;
                    }
                }
                best
            })
            .collect())
    }

    pub fn norm_sq(&self) -> T {
        self.data.iter().map(|&x| x * x).sum()
    }

    /// log(softmax(x)) along the last axis, computed with the max-shift trick.
    pub fn log_softmax(&self) -> Result<Tensor<T>> {
        if self.ndim() == 0 {
            return Err(GradError::InvalidArgument("log_softmax of a scalar".into()));
        }
        let last = Axis(self.ndim() - 1);
        let mut data = self.data.clone();
        for mut lane in data.lanes_mut(last) {
            let max = lane.iter().fold(T::neg_infinity(), |m, &x| if x > m { x } else { m });
            let sum_exp: T = lane.iter().map(|&x| (x - max).exp()).sum();
            let log_sum = max + sum_exp.ln();
            lane.mapv_inplace(|x| x - log_sum);
        }
        Ok(Tensor::new(data))
    }

    /// One-hot rows for integer class labels stored as floats.
    pub fn one_hot(labels: &Tensor<T>, num_classes: usize) -> Result<Tensor<T>> {
        let mut encoded = Array2::<T>::zeros((labels.size(), num_classes));
        for (row, &label) in labels.data.iter().enumerate() {
            let class = label.to_f64_lossy();
            if class < 0.0 || class.fract() != 0.0 || class as usize >= num_classes {
                return Err(GradError::InvalidArgument(format!(
                    "label {class} is not a class index below {num_classes}"
                )));
            }
            encoded[[row, class as usize]] = T::one();
        }
        Ok(Tensor::new(encoded.into_dyn()))
    }

    // IN-PLACE OPERATIONS

    /// In place: `self += other`. Shapes must match exactly.
    pub fn accumulate(&mut self, other: &Tensor<T>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(GradError::shape_mismatch("accumulate", self.shape(), other.shape()));
        }
        self.data += &other.data;
        Ok(())
    }

    /// In place: `self += alpha * other`.
    pub fn scaled_add(&mut self, alpha: T, other: &Tensor<T>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(GradError::shape_mismatch("scaled_add", self.shape(), other.shape()));
        }
        self.data.scaled_add(alpha, &other.data);
        Ok(())
    }

    /// In place: sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// In place: applies `f` to every element.
    pub fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(T) -> T,
    {
        self.data.mapv_inplace(f);
    }

    // COMPARISON

    /// Same shape and every element within `tolerance`.
    pub fn allclose(&self, other: &Tensor<T>, tolerance: T) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(&a, &b)| (a - b).abs() <= tolerance)
    }

    pub fn has_non_finite(&self) -> bool {
        self.data.iter().any(|x| !x.is_finite())
    }

    // HELPERS

    fn check_axis(&self, axis: usize) -> Result<()> {
        if axis >= self.ndim() {
            return Err(GradError::InvalidArgument(format!(
                "axis {axis} out of range for {}-d tensor",
                self.ndim()
            )));
        }
        Ok(())
    }

    fn resolve_axes(&self, axes: Option<&[usize]>) -> Result<Vec<usize>> {
        match axes {
            None => Ok((0..self.ndim()).collect()),
            Some(axes) => {
                let mut seen = Vec::with_capacity(axes.len());
                for &axis in axes {
                    self.check_axis(axis)?;
                    if seen.contains(&axis) {
                        return Err(GradError::InvalidArgument(format!("axis {axis} repeated")));
                    }
                    seen.push(axis);
                }
                Ok(seen)
            }
        }
    }
}

fn validate_permutation(axes: &[usize], ndim: usize) -> Result<()> {
    let mut seen = vec![false; ndim];
    if axes.len() != ndim {
        return Err(GradError::InvalidArgument(format!(
            "permutation {axes:?} does not cover {ndim} axes"
        )));
    }
    for &axis in axes {
        if axis >= ndim || seen[axis] {
            return Err(GradError::InvalidArgument(format!(
                "invalid permutation {axes:?} for {ndim} axes"
            )));
        }
        seen[axis] = true;
    }
    Ok(())
}

impl<T> From<ArrayD<T>> for Tensor<T>
where
    T: GradFloat,
{
    fn from(data: ArrayD<T>) -> Self {
        Self::new(data)
    }
}

impl<T> fmt::Display for Tensor<T>
where
    T: GradFloat,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?}, data={})", self.shape(), self.data)
    }
}
