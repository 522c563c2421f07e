//! Weight layout packing for PE/SIMD convolution engines
//!
//! The engine streams its kernel as `KERNEL[outer][PE][SIMD]` where
//! `outer = (CO/PE) * K * K * (CI/SIMD)`. [`PackedKernel::pack`] fills that
//! structure from a flat weight sequence in one sequential pass, nested
//! outermost to innermost as:
//!
//! 1. output-channel group (`CO/PE`)
//! 2. kernel row (`K`)
//! 3. kernel column (`K`)
//! 4. input-channel group (`CI/SIMD`)
//! 5. PE lane (`PE`)
//! 6. SIMD lane (`SIMD`)
//!
//! Every scalar is the low 8 bits of its source value (wrap, not saturate).

use crate::config::DeconvConfig;
use crate::error::{DeconvError, Result};
use crate::parallelism::Parallelism;

/// How the supplied weight sequence was fitted to the required length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Supplied length matched exactly
    AsIs,
    /// Shorter than required; zeros appended
    Padded { supplied: usize },
    /// Longer than required; tail dropped
    Truncated { supplied: usize },
    /// Nothing supplied; `0, 1, .., N-1` substituted
    Fallback,
}

/// Outer extent `(CO/PE) * K * K * (CI/SIMD)`
///
/// # Errors
/// `InvalidConfig` if the product overflows `usize`.
pub fn outer_dim(cfg: &DeconvConfig, par: Parallelism) -> Result<usize> {
    let k = cfg.kernel_size();
    (cfg.out_channels() / par.pe)
        .checked_mul(k)
        .and_then(|v| v.checked_mul(k))
        .and_then(|v| v.checked_mul(cfg.in_channels() / par.simd))
        .ok_or_else(|| extent_overflow(cfg, par))
}

/// Scalar count `outer * PE * SIMD`
///
/// # Errors
/// `InvalidConfig` if the product overflows `usize`.
pub fn required_elements(cfg: &DeconvConfig, par: Parallelism) -> Result<usize> {
    outer_dim(cfg, par)?
        .checked_mul(par.pe)
        .and_then(|v| v.checked_mul(par.simd))
        .ok_or_else(|| extent_overflow(cfg, par))
}

fn extent_overflow(cfg: &DeconvConfig, par: Parallelism) -> DeconvError {
    DeconvError::InvalidConfig(format!(
        "kernel extent overflows for {cfg} at PE={} SIMD={}",
        par.pe, par.simd
    ))
}

/// Fit `weights` to exactly `n` values
///
/// Never fails: an empty input becomes the incremental pattern, a short one
/// is zero-padded and a long one truncated.
pub fn normalize_weights(weights: &[i64], n: usize) -> (Vec<i64>, Normalization) {
    let supplied = weights.len();
    if supplied == 0 {
        return ((0..n as i64).collect(), Normalization::Fallback);
    }
    let mut values = weights[..supplied.min(n)].to_vec();
    let outcome = match supplied.cmp(&n) {
        std::cmp::Ordering::Equal => Normalization::AsIs,
        std::cmp::Ordering::Less => {
            values.resize(n, 0);
            Normalization::Padded { supplied }
        }
        std::cmp::Ordering::Greater => Normalization::Truncated { supplied },
    };
    (values, outcome)
}

/// Low 8 bits of `v`
#[inline]
pub fn quantize(v: i64) -> u8 {
    (v & 0xFF) as u8
}

/// Kernel laid out as `[outer][PE][SIMD]` bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedKernel {
    parallelism: Parallelism,
    tiles: Vec<Vec<Vec<u8>>>,
    normalization: Normalization,
}

impl PackedKernel {
    /// Pack `weights` for `cfg` at the given parallelism
    ///
    /// # Panics
    /// Panics if PE does not divide CO, SIMD does not divide CI, or the
    /// kernel extent overflows. Use [`PackedKernel::try_pack`] for unchecked
    /// input.
    pub fn pack(cfg: &DeconvConfig, par: Parallelism, weights: &[i64]) -> Self {
        assert!(
            par.divides(cfg),
            "PE={} must divide CO={} and SIMD={} must divide CI={}",
            par.pe,
            cfg.out_channels(),
            par.simd,
            cfg.in_channels()
        );
        let n = required_elements(cfg, par).unwrap_or_else(|e| panic!("{e}"));
        Self::fill(cfg, par, n, weights)
    }

    /// Like [`PackedKernel::pack`] but reports bad input as an error
    ///
    /// # Errors
    /// `Precondition` if PE does not divide CO or SIMD does not divide CI,
    /// `InvalidConfig` if the kernel extent overflows.
    pub fn try_pack(cfg: &DeconvConfig, par: Parallelism, weights: &[i64]) -> Result<Self> {
        if !par.divides(cfg) {
            return Err(DeconvError::Precondition(format!(
                "PE={} must divide CO={} and SIMD={} must divide CI={}",
                par.pe,
                cfg.out_channels(),
                par.simd,
                cfg.in_channels()
            )));
        }
        let n = required_elements(cfg, par)?;
        Ok(Self::fill(cfg, par, n, weights))
    }

    fn fill(cfg: &DeconvConfig, par: Parallelism, n: usize, weights: &[i64]) -> Self {
        let (values, normalization) = normalize_weights(weights, n);
        let k = cfg.kernel_size();
        let co_groups = cfg.out_channels() / par.pe;
        let ci_groups = cfg.in_channels() / par.simd;

        let mut tiles = Vec::with_capacity(n / (par.pe * par.simd));
        let mut idx = 0;
        for _co_group in 0..co_groups {
            for _k_row in 0..k {
                for _k_col in 0..k {
                    for _ci_group in 0..ci_groups {
                        let mut lanes = Vec::with_capacity(par.pe);
                        for _pe in 0..par.pe {
                            let mut simd = Vec::with_capacity(par.simd);
                            for _s in 0..par.simd {
                                simd.push(quantize(values[idx]));
                                idx += 1;
                            }
                            lanes.push(simd);
                        }
                        tiles.push(lanes);
                    }
                }
            }
        }
        assert_eq!(idx, n, "packer consumed {idx} of {n} weights");

        PackedKernel {
            parallelism: par,
            tiles,
            normalization,
        }
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    pub fn outer_dim(&self) -> usize {
        self.tiles.len()
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Total scalar count, `outer * PE * SIMD`
    pub fn len(&self) -> usize {
        self.outer_dim() * self.parallelism.pe * self.parallelism.simd
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Vec<Vec<u8>>] {
        &self.tiles
    }

    /// Scalars in emission order
    pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
        self.tiles.iter().flatten().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ci: usize, co: usize, k: usize) -> DeconvConfig {
        DeconvConfig::new(3, ci, co, k, 1, 0).unwrap()
    }

    #[test]
    fn test_trivial_config() {
        let c = cfg(1, 1, 1);
        let packed = PackedKernel::pack(&c, Parallelism::new(1, 1), &[300]);
        assert_eq!(packed.outer_dim(), 1);
        assert_eq!(packed.len(), 1);
        assert_eq!(packed.tiles(), &[vec![vec![44u8]]]);
        assert_eq!(packed.normalization(), Normalization::AsIs);
    }

    #[test]
    fn test_pe2_simd1_layout() {
        // CO=4, PE=2, CI=2, SIMD=1, K=1 -> outer 4, N 8
        let c = cfg(2, 4, 1);
        let par = Parallelism::new(2, 1);
        assert_eq!(outer_dim(&c, par).unwrap(), 4);
        assert_eq!(required_elements(&c, par).unwrap(), 8);
        let packed = PackedKernel::pack(&c, par, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            packed.tiles(),
            &[
                vec![vec![1u8], vec![2]],
                vec![vec![3], vec![4]],
                vec![vec![5], vec![6]],
                vec![vec![7], vec![8]],
            ]
        );
    }

    #[test]
    fn test_fallback_pattern() {
        // CO=5, K=1, CI=1 -> N=5
        let c = cfg(1, 5, 1);
        let packed = PackedKernel::pack(&c, Parallelism::new(1, 1), &[]);
        assert_eq!(packed.values().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(packed.normalization(), Normalization::Fallback);
    }

    #[test]
    fn test_fallback_wraps_past_255() {
        let c = cfg(1, 1, 17); // N = 289
        let packed = PackedKernel::pack(&c, Parallelism::new(1, 1), &[]);
        let values: Vec<u8> = packed.values().collect();
        assert_eq!(values[255], 255);
        assert_eq!(values[256], 0);
        assert_eq!(values[288], 32);
    }

    #[test]
    fn test_padding_and_truncation() {
        let c = cfg(1, 2, 2); // N = 8
        let par = Parallelism::new(1, 1);

        let short = PackedKernel::pack(&c, par, &[9, 8, 7]);
        assert_eq!(
            short.values().collect::<Vec<_>>(),
            vec![9, 8, 7, 0, 0, 0, 0, 0]
        );
        assert_eq!(short.normalization(), Normalization::Padded { supplied: 3 });

        let long: Vec<i64> = (100..120).collect();
        let packed = PackedKernel::pack(&c, par, &long);
        assert_eq!(
            packed.values().collect::<Vec<_>>(),
            (100..108).collect::<Vec<u8>>()
        );
        assert_eq!(
            packed.normalization(),
            Normalization::Truncated { supplied: 20 }
        );
    }

    #[test]
    fn test_negative_values_wrap() {
        assert_eq!(quantize(-1), 255);
        assert_eq!(quantize(-256), 0);
        assert_eq!(quantize(0x1_23), 0x23);
    }

    #[test]
    fn test_try_pack_rejects_non_divisor() {
        let c = cfg(3, 4, 1);
        assert!(matches!(
            PackedKernel::try_pack(&c, Parallelism::new(3, 1), &[]),
            Err(DeconvError::Precondition(_))
        ));
        assert!(PackedKernel::try_pack(&c, Parallelism::new(2, 3), &[]).is_ok());
    }

    #[test]
    fn test_extent_overflow_is_an_error() {
        let c = DeconvConfig::new(3, 1, 1, usize::MAX / 2, 1, 0).unwrap();
        let par = Parallelism::new(1, 1);
        assert!(matches!(
            outer_dim(&c, par),
            Err(DeconvError::InvalidConfig(_))
        ));
        assert!(matches!(
            PackedKernel::try_pack(&c, par, &[]),
            Err(DeconvError::InvalidConfig(_))
        ));
    }

    #[test]
    #[should_panic(expected = "must divide")]
    fn test_pack_panics_on_non_divisor() {
        let c = cfg(1, 3, 1);
        let _ = PackedKernel::pack(&c, Parallelism::new(2, 1), &[]);
    }

    #[test]
    fn test_matches_reference_header_pe3() {
        // First rows of the PE=3 KERNEL for K3 S1 H3 CI1 CO3 P1
        let weights = [0x68, 0x16, 0x09, 0xc3, 0xe7, 0x7e];
        let c = DeconvConfig::new(3, 1, 3, 3, 1, 1).unwrap();
        let packed = PackedKernel::pack(&c, Parallelism::new(3, 1), &weights);
        assert_eq!(packed.outer_dim(), 9);
        assert_eq!(packed.tiles()[0], vec![vec![0x68u8], vec![0x16], vec![0x09]]);
        assert_eq!(packed.tiles()[1], vec![vec![0xc3u8], vec![0xe7], vec![0x7e]]);
        assert_eq!(packed.tiles()[2], vec![vec![0u8], vec![0], vec![0]]);
    }
}
