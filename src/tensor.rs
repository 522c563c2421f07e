use std::fmt;

// ===== TENSOR STRUCTURE =====

/// Dense integer tensor in row-major order
///
/// Fields:
/// - `data`: flat values, len = product of shape dims
/// - `shape`: dimensions, e.g. [batch, channels, height, width]
#[derive(Clone, PartialEq, Eq)]
pub struct Tensor {
    pub data: Vec<i64>,
    pub shape: Vec<usize>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("numel", &self.data.len())
            .finish()
    }
}

// ===== TENSOR CONSTRUCTORS =====
impl Tensor {
    /// Create a new tensor from data and shape
    ///
    /// # Panics
    /// Panics if data.len() != shape.product()
    pub fn new(data: Vec<i64>, shape: &[usize]) -> Tensor {
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "Data length must match shape"
        );
        Tensor {
            data,
            shape: shape.to_vec(),
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Tensor {
        let size = shape.iter().product();
        Self::new(vec![0; size], shape)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Dimensions joined by `sep`, e.g. `1x3x5x5`
    pub fn shape_string(&self, sep: char) -> String {
        self.shape
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&sep.to_string())
    }
}

// ===== MOVEMENT =====
impl Tensor {
    /// Row-major strides for `shape`
    pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Reinterpret the data under a new shape with the same element count
    pub fn reshape(&self, new_shape: &[usize]) -> Tensor {
        Self::new(self.data.clone(), new_shape)
    }

    /// Permute (reorder) tensor axes
    ///
    /// # Arguments
    /// * `axes` - New ordering of axes (must be a valid permutation of 0..rank)
    pub fn permute(&self, axes: &[usize]) -> Tensor {
        assert_eq!(axes.len(), self.rank(), "Axes length must match rank");
        let mut sorted_axes = axes.to_vec();
        sorted_axes.sort_unstable();
        for (i, &ax) in sorted_axes.iter().enumerate() {
            assert_eq!(i, ax, "Invalid permutation axes");
        }

        let new_shape: Vec<usize> = axes.iter().map(|&i| self.shape[i]).collect();
        let old_strides = Self::compute_strides(&self.shape);
        let mut new_data = vec![0; self.data.len()];

        // Helper: convert linear index to coordinates
        fn index_to_coords(idx: usize, shape: &[usize]) -> Vec<usize> {
            let mut coords = vec![0; shape.len()];
            let mut remaining = idx;
            for i in (0..shape.len()).rev() {
                coords[i] = remaining % shape[i];
                remaining /= shape[i];
            }
            coords
        }

        for (new_idx, val) in new_data.iter_mut().enumerate() {
            let new_coords = index_to_coords(new_idx, &new_shape);
            // Map new coordinates back to old coordinates
            let old_idx: usize = axes
                .iter()
                .zip(&new_coords)
                .map(|(&ax, &c)| c * old_strides[ax])
                .sum();
            *val = self.data[old_idx];
        }
        Self::new(new_data, &new_shape)
    }

    /// `(1, C, H, W)` to `(H, W, C)`
    ///
    /// # Panics
    /// Panics unless the tensor is 4D with a batch of one.
    pub fn to_channels_last(&self) -> Tensor {
        assert_eq!(self.rank(), 4, "Expected 4D tensor (B, C, H, W)");
        assert_eq!(self.shape[0], 1, "Channel-last export expects batch size 1");
        let (c, h, w) = (self.shape[1], self.shape[2], self.shape[3]);
        self.permute(&[0, 2, 3, 1]).reshape(&[h, w, c])
    }
}

// ===== NAMED TENSORS =====

/// Role of a tensor within one configuration's artifact set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorKind {
    Input,
    Weights,
    Bias,
    Output,
}

impl TensorKind {
    /// Suffix appended to the configuration's base name for the values file
    pub fn file_suffix(&self) -> &'static str {
        match self {
            TensorKind::Input => "_input.csv",
            TensorKind::Weights => "_weights.csv",
            TensorKind::Bias => "_bias.csv",
            TensorKind::Output => "_output.csv",
        }
    }

    /// Label used in the shapes record
    pub fn shape_label(&self) -> &'static str {
        match self {
            TensorKind::Input => "input_shape",
            TensorKind::Weights => "weights_shape",
            TensorKind::Bias => "bias_shape",
            TensorKind::Output => "output_shape",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Data length must match shape")]
    fn test_shape_mismatch_panics() {
        let _ = Tensor::new(vec![1, 2, 3], &[2, 2]);
    }

    #[test]
    fn test_permute_transpose() {
        let t = Tensor::new(vec![1, 2, 3, 4, 5, 6], &[2, 3]);
        let p = t.permute(&[1, 0]);
        assert_eq!(p.shape, vec![3, 2]);
        assert_eq!(p.data, vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_channels_last() {
        // C=2, H=1, W=2: channel 0 = [1, 2], channel 1 = [10, 20]
        let t = Tensor::new(vec![1, 2, 10, 20], &[1, 2, 1, 2]);
        let cl = t.to_channels_last();
        assert_eq!(cl.shape, vec![1, 2, 2]);
        assert_eq!(cl.data, vec![1, 10, 2, 20]);
    }

    #[test]
    fn test_shape_string() {
        let t = Tensor::zeros(&[1, 3, 5, 5]);
        assert_eq!(t.shape_string('x'), "1x3x5x5");
        assert_eq!(t.numel(), 75);
    }

    #[test]
    #[should_panic(expected = "Invalid permutation axes")]
    fn test_invalid_permutation() {
        let t = Tensor::zeros(&[2, 2]);
        let _ = t.permute(&[0, 0]);
    }
}
