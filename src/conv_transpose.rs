use crate::config::DeconvConfig;
use crate::error::{DeconvError, Result};
use crate::tensor::Tensor;

/// Transposed 2D convolution (also called deconvolution)
///
/// Contract: input `(1, CI, H, W)`, weight `(CI, CO, K, K)`, optional bias
/// `(CO)`, dilation 1, groups 1. Output `(1, CO, H_out, W_out)` with
/// `H_out = (H - 1) * stride - 2 * padding + K`.
pub trait ConvTransposeEngine {
    fn forward(
        &self,
        input: &Tensor,
        weight: &Tensor,
        bias: Option<&Tensor>,
        stride: usize,
        padding: usize,
    ) -> Result<Tensor>;

    /// Run the layer described by `cfg`
    fn forward_config(
        &self,
        cfg: &DeconvConfig,
        input: &Tensor,
        weight: &Tensor,
        bias: Option<&Tensor>,
    ) -> Result<Tensor> {
        self.forward(input, weight, bias, cfg.stride(), cfg.padding())
    }
}

/// Exact integer reference implementation (matmul + col2im)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceConvTranspose;

impl ReferenceConvTranspose {
    pub fn new() -> Self {
        ReferenceConvTranspose
    }

    /// Convert column matrix back to image format
    ///
    /// # Arguments
    /// * `col` - Column matrix [B*H_in*W_in, C_out*K*K]
    /// * `out_channels` - Number of output channels
    /// * `in_h`, `in_w` - Input height and width
    /// * `h_out`, `w_out` - Output height and width
    #[allow(clippy::too_many_arguments)]
    fn col2im_transpose(
        col: &[i64],
        batch: usize,
        out_channels: usize,
        in_h: usize,
        in_w: usize,
        (h_out, w_out): (usize, usize),
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Vec<i64>> {
        let mut result = vec![0i64; batch * out_channels * h_out * w_out];
        let cols = out_channels * kernel * kernel;

        for b in 0..batch {
            for ih in 0..in_h {
                for iw in 0..in_w {
                    let row_idx = b * (in_h * in_w) + ih * in_w + iw;

                    // Starting position in output (before padding)
                    let h_start = ih * stride;
                    let w_start = iw * stride;

                    for c in 0..out_channels {
                        for kh_idx in 0..kernel {
                            for kw_idx in 0..kernel {
                                let h_pos = h_start + kh_idx;
                                let w_pos = w_start + kw_idx;

                                // Skip if position is in padding region
                                if h_pos < padding || h_pos >= h_out + padding {
                                    continue;
                                }
                                if w_pos < padding || w_pos >= w_out + padding {
                                    continue;
                                }

                                let out_idx = b * (out_channels * h_out * w_out)
                                    + c * (h_out * w_out)
                                    + (h_pos - padding) * w_out
                                    + (w_pos - padding);

                                let col_idx = c * (kernel * kernel) + kh_idx * kernel + kw_idx;
                                result[out_idx] = result[out_idx]
                                    .checked_add(col[row_idx * cols + col_idx])
                                    .ok_or_else(|| accumulate_overflow(c))?;
                            }
                        }
                    }
                }
            }
        }

        Ok(result)
    }
}

fn accumulate_overflow(channel: usize) -> DeconvError {
    DeconvError::Overflow(format!(
        "output channel {channel} exceeds the i64 range; narrow the input or weight range"
    ))
}

fn output_extent(size: usize, stride: usize, kernel: usize, padding: usize) -> Result<usize> {
    let full = (size - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(kernel))
        .ok_or_else(|| {
            DeconvError::InvalidConfig(format!(
                "output size overflows (size {size}, stride {stride}, kernel {kernel})"
            ))
        })?;
    match padding.checked_mul(2).and_then(|p| full.checked_sub(p)) {
        Some(n) if n > 0 => Ok(n),
        _ => Err(DeconvError::InvalidConfig(format!(
            "padding {padding} leaves no output (size {size}, stride {stride}, kernel {kernel})"
        ))),
    }
}

impl ConvTransposeEngine for ReferenceConvTranspose {
    fn forward(
        &self,
        input: &Tensor,
        weight: &Tensor,
        bias: Option<&Tensor>,
        stride: usize,
        padding: usize,
    ) -> Result<Tensor> {
        if input.rank() != 4 {
            return Err(DeconvError::InvalidConfig(format!(
                "input must be 4D (B, C, H, W), got {:?}",
                input.shape
            )));
        }
        if weight.rank() != 4 || weight.shape[2] != weight.shape[3] {
            return Err(DeconvError::InvalidConfig(format!(
                "weight must be (CI, CO, K, K), got {:?}",
                weight.shape
            )));
        }
        let (batch, in_channels, in_h, in_w) =
            (input.shape[0], input.shape[1], input.shape[2], input.shape[3]);
        let (weight_in_ch, out_channels, kernel) =
            (weight.shape[0], weight.shape[1], weight.shape[2]);
        if weight_in_ch != in_channels {
            return Err(DeconvError::InvalidConfig(format!(
                "channel mismatch: input has {in_channels} channels but weight expects {weight_in_ch}"
            )));
        }
        if let Some(b) = bias
            && b.shape != [out_channels]
        {
            return Err(DeconvError::InvalidConfig(format!(
                "bias must be ({out_channels},), got {:?}",
                b.shape
            )));
        }
        if stride == 0 || in_h == 0 || in_w == 0 {
            return Err(DeconvError::InvalidConfig(
                "stride and spatial dims must be positive".to_string(),
            ));
        }

        let h_out = output_extent(in_h, stride, kernel, padding)?;
        let w_out = output_extent(in_w, stride, kernel, padding)?;

        // 1. [B, C_in, H, W] -> [B*H*W, C_in]
        let rows = batch * in_h * in_w;
        let plane = in_h * in_w;
        // 2. [C_in, C_out*K*K] @ per-row input -> [B*H*W, C_out*K*K]
        let cols = out_channels * kernel * kernel;
        let mut col = vec![0i64; rows * cols];
        for b in 0..batch {
            for p in 0..plane {
                let row = b * plane + p;
                for ci in 0..in_channels {
                    let x = input.data[b * in_channels * plane + ci * plane + p];
                    if x == 0 {
                        continue;
                    }
                    let w_row = &weight.data[ci * cols..(ci + 1) * cols];
                    for (j, (dst, &w)) in col[row * cols..(row + 1) * cols]
                        .iter_mut()
                        .zip(w_row)
                        .enumerate()
                    {
                        let acc = *dst;
                        *dst = x
                            .checked_mul(w)
                            .and_then(|xw| xw.checked_add(acc))
                            .ok_or_else(|| accumulate_overflow(j / (kernel * kernel)))?;
                    }
                }
            }
        }

        // 3. col2im into the output image
        let mut data = Self::col2im_transpose(
            &col,
            batch,
            out_channels,
            in_h,
            in_w,
            (h_out, w_out),
            kernel,
            stride,
            padding,
        )?;

        // 4. Add bias if present
        if let Some(b) = bias {
            for (i, v) in data.iter_mut().enumerate() {
                let channel = (i / (h_out * w_out)) % out_channels;
                *v = v
                    .checked_add(b.data[channel])
                    .ok_or_else(|| accumulate_overflow(channel))?;
            }
        }

        Ok(Tensor::new(data, &[batch, out_channels, h_out, w_out]))
    }
}
