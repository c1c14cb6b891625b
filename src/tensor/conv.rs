// src/tensor/conv.rs
// 2D convolution (im2col + matmul) and max pooling over NCHW tensors.

use super::Tensor;
use crate::error::{GradError, Result};
use crate::number::GradFloat;
use ndarray::{Array, Array2, Array4, ArrayView4, Ix2, Ix4};

/// Sizes shared by the forward and backward passes of a sliding-window op.
#[derive(Debug, Clone, Copy)]
struct WindowGeometry {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
    kernel_h: usize,
    kernel_w: usize,
    stride: usize,
    padding: usize,
    out_h: usize,
    out_w: usize,
}

impl WindowGeometry {
    fn new(input: &[usize], kernel: (usize, usize), stride: usize, padding: usize) -> Result<Self> {
        if input.len() != 4 {
            return Err(GradError::InvalidArgument(format!(
                "expected NCHW input, got shape {input:?}"
            )));
        }
        if stride == 0 || kernel.0 == 0 || kernel.1 == 0 {
            return Err(GradError::InvalidArgument(
                "kernel size and stride must be positive".into(),
            ));
        }
        let (height, width) = (input[2] + 2 * padding, input[3] + 2 * padding);
        if kernel.0 > height || kernel.1 > width {
            return Err(GradError::InvalidArgument(format!(
                "kernel {kernel:?} larger than padded input {height}x{width}"
            )));
        }
        Ok(Self {
            batch: input[0],
            channels: input[1],
            height: input[2],
            width: input[3],
            kernel_h: kernel.0,
            kernel_w: kernel.1,
            stride,
            padding,
            out_h: (height - kernel.0) / stride + 1,
            out_w: (width - kernel.1) / stride + 1,
        })
    }

    fn patch_len(&self) -> usize {
        self.channels * self.kernel_h * self.kernel_w
    }

    fn rows(&self) -> usize {
        self.batch * self.out_h * self.out_w
    }

    /// Input coordinate for an output position and kernel offset, `None` inside the padding.
    fn source(&self, out: usize, k: usize, limit: usize) -> Option<usize> {
        let pos = out * self.stride + k;
        if pos < self.padding || pos - self.padding >= limit {
            None
        } else {
            Some(pos - self.padding)
        }
    }
}

fn im2col<T: GradFloat>(input: &ArrayView4<'_, T>, g: &WindowGeometry) -> Array2<T> {
    let mut cols = Array2::<T>::zeros((g.rows(), g.patch_len()));
    for b in 0..g.batch {
        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                let row = (b * g.out_h + oy) * g.out_w + ox;
                for c in 0..g.channels {
                    for ky in 0..g.kernel_h {
                        let Some(iy) = g.source(oy, ky, g.height) else {
                            continue;
                        };
                        for kx in 0..g.kernel_w {
                            if let Some(ix) = g.source(ox, kx, g.width) {
                                let col = (c * g.kernel_h + ky) * g.kernel_w + kx;
                                cols[[row, col]] = input[[b, c, iy, ix]];
                            }
                        }
                    }
                }
            }
        }
    }
    cols
}

fn col2im<T: GradFloat>(cols: &Array2<T>, g: &WindowGeometry) -> Array4<T> {
    let mut image = Array4::<T>::zeros((g.batch, g.channels, g.height, g.width));
    for b in 0..g.batch {
        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                let row = (b * g.out_h + oy) * g.out_w + ox;
                for c in 0..g.channels {
                    for ky in 0..g.kernel_h {
                        let Some(iy) = g.source(oy, ky, g.height) else {
                            continue;
                        };
                        for kx in 0..g.kernel_w {
                            if let Some(ix) = g.source(ox, kx, g.width) {
                                let col = (c * g.kernel_h + ky) * g.kernel_w + kx;
                                image[[b, c, iy, ix]] += cols[[row, col]];
                            }
                        }
                    }
                }
            }
        }
    }
    image
}

impl<T> Tensor<T>
where
    T: GradFloat,
{
    fn as_nchw(&self) -> Result<ArrayView4<'_, T>> {
        Ok(self.data.view().into_dimensionality::<Ix4>()?)
    }

    /// Kernel `[out_channels, in_channels * kh * kw]` as a matrix.
    fn kernel_matrix(weight: &Tensor<T>, g: &WindowGeometry) -> Result<Array2<T>> {
        let shape = weight.shape();
        if shape.len() != 4 || shape[1] != g.channels {
            return Err(GradError::ShapeMismatch {
                context: "conv2d weight",
                expected: vec![shape.first().copied().unwrap_or(0), g.channels, g.kernel_h, g.kernel_w],
                actual: shape.to_vec(),
            });
        }
        let flat = weight.reshape(&[shape[0], g.patch_len()])?;
        Ok(flat.into_data().into_dimensionality::<Ix2>()?)
    }

    /// Cross-correlation of an NCHW input with an `[O, C, KH, KW]` kernel. No bias.
    pub fn conv2d(&self, weight: &Tensor<T>, stride: usize, padding: usize) -> Result<Tensor<T>> {
        let ws = weight.shape();
        if ws.len() != 4 {
            return Err(GradError::InvalidArgument(format!(
                "conv2d weight must be 4-D, got {ws:?}"
            )));
        }
        let g = WindowGeometry::new(self.shape(), (ws[2], ws[3]), stride, padding)?;
        let kernel = Self::kernel_matrix(weight, &g)?;
        let cols = im2col(&self.as_nchw()?, &g);

        // [N*OH*OW, O] -> [N, OH, OW, O] -> [N, O, OH, OW]
        let out = cols.dot(&kernel.t());
        let out = Array::from_shape_vec((g.batch, g.out_h, g.out_w, ws[0]), out.iter().copied().collect())?;
        let out = out.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned();
        Ok(Tensor::new(out.into_dyn()))
    }

    /// Gradients of `conv2d` with respect to the input and the kernel.
    pub fn conv2d_backward(
        input: &Tensor<T>,
        weight: &Tensor<T>,
        grad_output: &Tensor<T>,
        stride: usize,
        padding: usize,
    ) -> Result<(Tensor<T>, Tensor<T>)> {
        let ws = weight.shape();
        if ws.len() != 4 {
            return Err(GradError::InvalidArgument(format!(
                "conv2d weight must be 4-D, got {ws:?}"
            )));
        }
        let g = WindowGeometry::new(input.shape(), (ws[2], ws[3]), stride, padding)?;
        let expected = [g.batch, ws[0], g.out_h, g.out_w];
        if grad_output.shape() != expected {
            return Err(GradError::shape_mismatch("conv2d grad_output", &expected, grad_output.shape()));
        }

        let kernel = Self::kernel_matrix(weight, &g)?;
        let cols = im2col(&input.as_nchw()?, &g);

        // [N, O, OH, OW] -> [N, OH, OW, O] -> [N*OH*OW, O]
        let grad = grad_output.transpose(Some(&[0, 2, 3, 1]))?;
        let grad = Array2::from_shape_vec((g.rows(), ws[0]), grad.to_vec())?;

        let grad_weight = grad.t().dot(&cols);
        let grad_weight = Tensor::from_vec(grad_weight.iter().copied().collect(), ws)?;

        let grad_cols = grad.dot(&kernel);
        let grad_input = Tensor::new(col2im(&grad_cols, &g).into_dyn());
        Ok((grad_input, grad_weight))
    }

    /// Max pooling over square windows, no padding.
    pub fn max_pool2d(&self, kernel: usize, stride: usize) -> Result<Tensor<T>> {
        let g = WindowGeometry::new(self.shape(), (kernel, kernel), stride, 0)?;
        let x = self.as_nchw()?;
        let mut out = Array4::<T>::zeros((g.batch, g.channels, g.out_h, g.out_w));
        for ((b, c, oy, ox), value) in out.indexed_iter_mut() {
            let (iy, ix) = window_argmax(&x, &g, b, c, oy, ox);
            *value = x[[b, c, iy, ix]];
        }
        Ok(Tensor::new(out.into_dyn()))
    }

    /// Routes each output gradient to the position that won its pooling window.
    pub fn max_pool2d_backward(
        input: &Tensor<T>,
        grad_output: &Tensor<T>,
        kernel: usize,
        stride: usize,
    ) -> Result<Tensor<T>> {
        let g = WindowGeometry::new(input.shape(), (kernel, kernel), stride, 0)?;
        let expected = [g.batch, g.channels, g.out_h, g.out_w];
        if grad_output.shape() != expected {
            return Err(GradError::shape_mismatch("max_pool2d grad_output", &expected, grad_output.shape()));
        }
        let x = input.as_nchw()?;
        let grad = grad_output.as_nchw()?;
        let mut grad_input = Array4::<T>::zeros((g.batch, g.channels, g.height, g.width));
        for ((b, c, oy, ox), &upstream) in grad.indexed_iter() {
            let (iy, ix) = window_argmax(&x, &g, b, c, oy, ox);
            grad_input[[b, c, iy, ix]] += upstream;
        }
        Ok(Tensor::new(grad_input.into_dyn()))
    }
}

/// Position of the first maximum inside one pooling window.
fn window_argmax<T: GradFloat>(
    x: &ArrayView4<'_, T>,
    g: &WindowGeometry,
    b: usize,
    c: usize,
    oy: usize,
    ox: usize,
) -> (usize, usize) {
    let (y0, x0) = (oy * g.stride, ox * g.stride);
    let mut best = (y0, x0);
    for ky in 0..g.kernel_h {
        for kx in 0..g.kernel_w {
            let (iy, ix) = (y0 + ky, x0 + kx);
            if x[[b, c, iy, ix]] > x[[b, c, best.0, best.1]] {
                best = (iy, ix);
            }
        }
    }
    best
}
