//! Sweep drivers
//!
//! [`generate_data`] runs the parameter sweep and writes reference test
//! vectors. [`generate_headers`] reads a prior run's configuration table and
//! weights and writes the packed HLS headers.

use crate::config::{DeconvConfig, ParameterSpace};
use crate::conv_transpose::ConvTransposeEngine;
use crate::error::{DeconvError, Result};
use crate::generator::{SeedPolicy, SweepSampler, ValueRange};
use crate::header::{SELECTOR_FILE_NAME, render_config_header, render_selector_header};
use crate::io::{
    load_weight_listing, read_configs_csv, save_flat_csv, save_shapes_csv, write_configs_csv,
};
use crate::packer::PackedKernel;
use crate::parallelism::{Parallelism, pe_simd_configs};
use crate::tensor::TensorKind;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIGS_DIR: &str = "configs";
pub const CONFIGS_FILE: &str = "deconv_configs.csv";
pub const EXP_DATA_DIR: &str = "exp_data";

// ===== DATA SWEEP =====

/// Options for [`generate_data`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub out_dir: PathBuf,
    pub seed: u64,
    pub input_range: (i64, i64),
    pub weight_range: (i64, i64),
    pub bias: bool,
    pub clean: bool,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub seed_policy: SeedPolicy,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            out_dir: PathBuf::from("deconv_data"),
            seed: 1234,
            input_range: (1, 1),
            weight_range: (0, 255),
            bias: false,
            clean: true,
            limit: None,
            dry_run: false,
            seed_policy: SeedPolicy::Shared,
        }
    }
}

/// What a sweep produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub configs_csv: PathBuf,
    pub configurations: usize,
    pub files_written: usize,
}

/// Generate input, weight, optional bias and output tensors for every
/// configuration in `space`
///
/// # Errors
/// `Range` for an inverted input or weight range, `InvalidConfig` from the
/// enumerator or for a configuration with no output, `Overflow` if the
/// engine's accumulation leaves the `i64` range, `Io`/`Csv` on write
/// failures. Nothing is written or removed before the ranges and every
/// configuration's output size have been validated.
pub fn generate_data<E: ConvTransposeEngine>(
    space: &ParameterSpace,
    options: &GenerateOptions,
    engine: &E,
) -> Result<SweepReport> {
    let input_range = ValueRange::new(options.input_range.0, options.input_range.1)?;
    let weight_range = ValueRange::new(options.weight_range.0, options.weight_range.1)?;

    let mut configs = space.enumerate()?;
    info!("Total configurations: {}", configs.len());
    if let Some(limit) = options.limit {
        configs.truncate(limit);
    }
    for cfg in &configs {
        cfg.output_size()?;
    }

    let out_dir = &options.out_dir;
    if options.clean && !options.dry_run && out_dir.is_dir() {
        info!("Removing existing output directory: {}", out_dir.display());
        fs::remove_dir_all(out_dir)?;
    }
    fs::create_dir_all(out_dir)?;

    let configs_csv = out_dir.join(CONFIGS_DIR).join(CONFIGS_FILE);
    write_configs_csv(&configs_csv, &configs)?;
    let exp_dir = out_dir.join(EXP_DATA_DIR);
    fs::create_dir_all(&exp_dir)?;
    info!("Saved configuration table: {}", configs_csv.display());

    let total = configs.len();
    if options.dry_run {
        info!("Dry-run: listing configurations only (no tensors generated).");
        for (i, cfg) in configs.iter().enumerate() {
            info!("[{}/{total}] {cfg}", i + 1);
        }
        return Ok(SweepReport {
            configs_csv,
            configurations: total,
            files_written: 1,
        });
    }

    let mut sampler = SweepSampler::new(
        options.seed,
        options.seed_policy,
        input_range,
        weight_range,
        options.bias,
    );
    let mut files_written = 1;
    for (i, cfg) in configs.iter().enumerate() {
        debug!("Preparing data for configuration {}/{total}: {cfg}", i + 1);
        let base = exp_dir.join(cfg.base_name());
        let tensors = sampler.tensors_for(i, cfg);
        let output =
            engine.forward_config(cfg, &tensors.input, &tensors.weights, tensors.bias.as_ref())?;

        let mut shapes = vec![
            (TensorKind::Input, &tensors.input),
            (TensorKind::Weights, &tensors.weights),
            (TensorKind::Output, &output),
        ];
        if let Some(bias) = tensors.bias.as_ref() {
            shapes.push((TensorKind::Bias, bias));
        }

        for &(kind, tensor) in &shapes {
            let path = with_suffix(&base, kind.file_suffix());
            if kind == TensorKind::Output {
                save_flat_csv(&path, &tensor.to_channels_last())?;
            } else {
                save_flat_csv(&path, tensor)?;
            }
            files_written += 1;
        }
        save_shapes_csv(with_suffix(&base, "_shapes.csv"), &shapes)?;
        files_written += 1;

        info!("[{}/{total}] {}", i + 1, cfg.base_name());
    }

    info!("Generation complete. Data root: {}", out_dir.display());
    Ok(SweepReport {
        configs_csv,
        configurations: total,
        files_written,
    })
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

// ===== HEADER GENERATION =====

/// Options for [`generate_headers`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderOptions {
    pub csv: PathBuf,
    pub exp_data: PathBuf,
    pub output: PathBuf,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        HeaderOptions {
            csv: Path::new("deconv_data").join(CONFIGS_DIR).join(CONFIGS_FILE),
            exp_data: Path::new("deconv_data").join(EXP_DATA_DIR),
            output: PathBuf::from("generated_configs"),
        }
    }
}

/// Data files found for one configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFiles {
    pub weights: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl DataFiles {
    /// Look up `cfg`'s data files in `exp_dir`
    pub fn locate(exp_dir: &Path, cfg: &DeconvConfig) -> Self {
        if !exp_dir.is_dir() {
            return DataFiles::default();
        }
        let base = exp_dir.join(cfg.base_name());
        let find = |kind: TensorKind| {
            let path = with_suffix(&base, kind.file_suffix());
            if path.is_file() {
                debug!("Found {kind:?} file for config: {cfg} -> {}", path.display());
                Some(path)
            } else {
                None
            }
        };
        DataFiles {
            weights: find(TensorKind::Weights),
            input: find(TensorKind::Input),
            output: find(TensorKind::Output),
        }
    }

    pub fn all_present(&self) -> bool {
        self.weights.is_some() && self.input.is_some() && self.output.is_some()
    }
}

/// One written configuration header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedHeader {
    pub config: DeconvConfig,
    pub path: PathBuf,
    pub variants: Vec<Parallelism>,
    pub kernels: Vec<PackedKernel>,
    pub files: DataFiles,
}

impl GeneratedHeader {
    pub fn file_name(&self) -> String {
        self.config.header_file_name()
    }
}

/// Headers written by [`generate_headers`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderReport {
    pub headers: Vec<GeneratedHeader>,
    pub selector: PathBuf,
    pub skipped_rows: usize,
}

/// Packed kernels for `cfg`, one per candidate parallelism
///
/// # Errors
/// `InvalidConfig` if the kernel extent overflows.
pub fn pack_variants(cfg: &DeconvConfig, weights: &[i64]) -> Result<Vec<PackedKernel>> {
    pe_simd_configs(cfg)
        .into_iter()
        .map(|par| PackedKernel::try_pack(cfg, par, weights))
        .collect()
}

/// Write one header per configuration in the table, plus the selector
///
/// # Errors
/// `Io` if the table is missing or a header can't be written; `InvalidConfig`
/// if the table holds no valid configuration or a kernel extent overflows.
pub fn generate_headers(options: &HeaderOptions) -> Result<HeaderReport> {
    if !options.csv.is_file() {
        return Err(DeconvError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("CSV file not found: {}", options.csv.display()),
        )));
    }
    fs::create_dir_all(&options.output)?;
    info!("Output directory: {}", options.output.display());

    info!("Loading configurations from {}", options.csv.display());
    let table = read_configs_csv(&options.csv)?;
    info!("Total valid configurations: {}", table.configs.len());
    if table.configs.is_empty() {
        return Err(DeconvError::InvalidConfig(
            "no valid configurations found".to_string(),
        ));
    }

    let mut headers = Vec::with_capacity(table.configs.len());
    for cfg in &table.configs {
        let files = DataFiles::locate(&options.exp_data, cfg);
        let weights = match &files.weights {
            Some(path) => load_weight_listing(path)?,
            None => {
                warn!("No weights file for {cfg}; using incremental pattern");
                Vec::new()
            }
        };

        let kernels = pack_variants(cfg, &weights)?;
        for kernel in &kernels {
            debug!(
                "{cfg} PE={} SIMD={}: {:?}",
                kernel.parallelism().pe,
                kernel.parallelism().simd,
                kernel.normalization()
            );
        }
        let path = options.output.join(cfg.header_file_name());
        fs::write(&path, render_config_header(cfg, &kernels))?;
        info!("Generated: {}", cfg.header_file_name());

        headers.push(GeneratedHeader {
            config: *cfg,
            path,
            variants: kernels.iter().map(PackedKernel::parallelism).collect(),
            kernels,
            files,
        });
    }
    let complete = headers.iter().filter(|h| h.files.all_present()).count();
    info!("Config groups with all files present: {complete}");

    let configs: Vec<DeconvConfig> = headers.iter().map(|h| h.config).collect();
    let selector = options.output.join(SELECTOR_FILE_NAME);
    fs::write(&selector, render_selector_header(&configs))?;
    info!("Selector header generated: {}", selector.display());

    let report = HeaderReport {
        headers,
        selector,
        skipped_rows: table.skipped,
    };
    for line in summary_lines(&report) {
        info!("{line}");
    }
    Ok(report)
}

/// Summary table: file name, parameters, PE/SIMD list
pub fn summary_lines(report: &HeaderReport) -> Vec<String> {
    let rule = "=".repeat(80);
    let mut lines = vec![
        rule.clone(),
        "GENERATED CONFIGURATIONS SUMMARY".to_string(),
        rule.clone(),
        format!("{:<45} {:<35} PE/SIMD", "Filename", "Parameters"),
        "-".repeat(80),
    ];
    for h in &report.headers {
        let variants: Vec<String> = h
            .variants
            .iter()
            .map(|p| format!("({},{})", p.pe, p.simd))
            .collect();
        lines.push(format!(
            "{:<45} {:<35} {}",
            h.file_name(),
            h.config.to_string(),
            variants.join(", ")
        ));
    }
    lines.push(rule);
    lines
}
