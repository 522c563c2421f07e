//! PE/SIMD tiling candidates for a configuration

use crate::config::DeconvConfig;

/// Number of PE candidates kept, smallest divisors first
pub const MAX_PE_CANDIDATES: usize = 3;
/// Number of SIMD candidates kept, smallest divisors first
pub const MAX_SIMD_CANDIDATES: usize = 2;

/// Hardware parallelism along output channels (PE) and input channels (SIMD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parallelism {
    pub pe: usize,
    pub simd: usize,
}

impl Parallelism {
    pub fn new(pe: usize, simd: usize) -> Self {
        Parallelism { pe, simd }
    }

    /// True if `pe` divides CO and `simd` divides CI
    pub fn divides(&self, cfg: &DeconvConfig) -> bool {
        self.pe > 0
            && self.simd > 0
            && cfg.out_channels() % self.pe == 0
            && cfg.in_channels() % self.simd == 0
    }
}

/// Ascending divisors of `n`; empty for zero
pub fn divisors(n: usize) -> Vec<usize> {
    (1..=n).filter(|i| n % i == 0).collect()
}

/// Candidate (PE, SIMD) pairs for `cfg`, PE-major
///
/// Never empty: (1, 1) always qualifies and is also the fallback.
pub fn pe_simd_configs(cfg: &DeconvConfig) -> Vec<Parallelism> {
    let pe_options = divisors(cfg.out_channels());
    let simd_options = divisors(cfg.in_channels());

    let configs: Vec<Parallelism> = pe_options
        .iter()
        .take(MAX_PE_CANDIDATES)
        .flat_map(|&pe| {
            simd_options
                .iter()
                .take(MAX_SIMD_CANDIDATES)
                .map(move |&simd| Parallelism::new(pe, simd))
        })
        .collect();

    if configs.is_empty() {
        vec![Parallelism::new(1, 1)]
    } else {
        configs
    }
}
