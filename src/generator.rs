//! Deterministic integer tensor generation
//!
//! A [`TensorGenerator`] owns its pseudo-random stream. For every
//! configuration it draws, in this order: weights `(CI, CO, K, K)`, bias
//! `(CO)` when enabled, then input `(1, CI, H, W)`. Same seed and same
//! configuration sequence give bit-identical tensors.

use crate::config::DeconvConfig;
use crate::error::{DeconvError, Result};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Inclusive integer sampling range `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    low: i64,
    high: i64,
}

impl ValueRange {
    /// # Errors
    /// `Range` if `low > high`.
    pub fn new(low: i64, high: i64) -> Result<Self> {
        if low > high {
            return Err(DeconvError::Range { low, high });
        }
        Ok(ValueRange { low, high })
    }

    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }
}

/// How random streams are assigned to the configurations of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// One stream seeded once and consumed across the whole sweep.
    /// Reordering configurations changes every later tensor.
    #[default]
    Shared,
    /// Each configuration gets its own stream seeded from
    /// [`derive_seed`]`(seed, index)`.
    PerConfig,
}

/// Tensors drawn for one configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSet {
    pub input: Tensor,
    pub weights: Tensor,
    pub bias: Option<Tensor>,
}

pub struct TensorGenerator {
    rng: StdRng,
}

impl TensorGenerator {
    pub fn new(seed: u64) -> Self {
        TensorGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Tensor of independent uniform draws from `range`
    pub fn sample(&mut self, shape: &[usize], range: ValueRange) -> Tensor {
        let size = shape.iter().product();
        let data: Vec<i64> = (0..size)
            .map(|_| self.rng.random_range(range.low..=range.high))
            .collect();
        Tensor::new(data, shape)
    }

    /// Draw weights, optional bias, then input for `cfg`
    pub fn generate(
        &mut self,
        cfg: &DeconvConfig,
        input_range: ValueRange,
        weight_range: ValueRange,
        bias: bool,
    ) -> TensorSet {
        let (ci, co, k, h) = (
            cfg.in_channels(),
            cfg.out_channels(),
            cfg.kernel_size(),
            cfg.input_size(),
        );
        let weights = self.sample(&[ci, co, k, k], weight_range);
        let bias = bias.then(|| self.sample(&[co], weight_range));
        let input = self.sample(&[1, ci, h, h], input_range);
        TensorSet {
            input,
            weights,
            bias,
        }
    }
}

/// Independent seed for configuration `index` of a sweep seeded with `base`
///
/// SplitMix64 finaliser over `base` and `index`; stable across platforms and
/// toolchain versions.
pub fn derive_seed(base: u64, index: usize) -> u64 {
    let mut z = base ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Hands out tensors for successive configurations of a sweep
///
/// Under [`SeedPolicy::Shared`] calls must arrive in enumeration order.
pub struct SweepSampler {
    seed: u64,
    policy: SeedPolicy,
    shared: TensorGenerator,
    input_range: ValueRange,
    weight_range: ValueRange,
    bias: bool,
}

impl SweepSampler {
    pub fn new(
        seed: u64,
        policy: SeedPolicy,
        input_range: ValueRange,
        weight_range: ValueRange,
        bias: bool,
    ) -> Self {
        SweepSampler {
            seed,
            policy,
            shared: TensorGenerator::new(seed),
            input_range,
            weight_range,
            bias,
        }
    }

    pub fn tensors_for(&mut self, index: usize, cfg: &DeconvConfig) -> TensorSet {
        match self.policy {
            SeedPolicy::Shared => {
                self.shared
                    .generate(cfg, self.input_range, self.weight_range, self.bias)
            }
            SeedPolicy::PerConfig => TensorGenerator::new(derive_seed(self.seed, index))
                .generate(cfg, self.input_range, self.weight_range, self.bias),
        }
    }
}
