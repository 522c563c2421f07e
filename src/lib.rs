//! Reproducible ConvTranspose2d test vectors and PE/SIMD weight packing
//!
//! The data path enumerates a parameter sweep, draws integer tensors from a
//! seeded stream in a fixed order and runs them through a reference
//! transposed convolution. The header path packs each configuration's weights
//! into the `[outer][PE][SIMD]` tile order consumed by a fixed-parallelism
//! HLS convolution engine.

pub mod cli;
pub mod config;
pub mod conv_transpose;
pub mod error;
pub mod generator;
pub mod header;
pub mod io;
pub mod packer;
pub mod parallelism;
pub mod pipeline;
pub mod tensor;

pub use config::{DeconvConfig, PARAMETER_KEYS, ParameterSpace};
pub use conv_transpose::{ConvTransposeEngine, ReferenceConvTranspose};
pub use error::{DeconvError, Result};
pub use generator::{SeedPolicy, SweepSampler, TensorGenerator, TensorSet, ValueRange};
pub use packer::{Normalization, PackedKernel};
pub use parallelism::{Parallelism, pe_simd_configs};
pub use pipeline::{GenerateOptions, HeaderOptions, generate_data, generate_headers};
pub use tensor::{Tensor, TensorKind};
