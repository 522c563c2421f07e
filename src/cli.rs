//! Command-line surface for the `deconv-bench` binary

use crate::config::ParameterSpace;
use crate::conv_transpose::ReferenceConvTranspose;
use crate::error::Result;
use crate::generator::SeedPolicy;
use crate::pipeline::{GenerateOptions, HeaderOptions, generate_data, generate_headers};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

/// deconv-bench - transposed-convolution test vectors and HLS weight headers
#[derive(Parser, Debug)]
#[command(name = "deconv-bench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate reference tensors for a ConvTranspose2d parameter sweep
    Generate {
        /// JSON file defining the parameter space
        #[arg(long, value_name = "FILE")]
        param_file: PathBuf,

        /// Root output directory
        #[arg(long, default_value = "deconv_data")]
        out_dir: PathBuf,

        /// Random seed
        #[arg(long, default_value_t = 1234)]
        seed: u64,

        /// Inclusive range for input values
        #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"], default_values_t = [1, 1], allow_negative_numbers = true)]
        input_range: Vec<i64>,

        /// Inclusive range for weight (and bias) values
        #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"], default_values_t = [0, 255], allow_negative_numbers = true)]
        weight_range: Vec<i64>,

        /// Include bias in the layer and save bias data
        #[arg(long)]
        bias: bool,

        /// Keep an existing output directory instead of removing it first
        #[arg(long)]
        no_clean: bool,

        /// Limit number of configurations processed
        #[arg(long)]
        limit: Option<usize>,

        /// Only list configurations, do not generate tensors
        #[arg(long)]
        dry_run: bool,

        /// Seed each configuration independently from (seed, index)
        #[arg(long)]
        per_config_seed: bool,
    },

    /// Generate packed-kernel HLS headers from a configuration table
    Headers {
        /// Configuration table written by `generate`
        #[arg(long, default_value = "deconv_data/configs/deconv_configs.csv")]
        csv: PathBuf,

        /// Directory holding `*_weights.csv` files
        #[arg(long, default_value = "deconv_data/exp_data")]
        exp_data: PathBuf,

        /// Output directory for generated headers
        #[arg(short, long, default_value = "generated_configs")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

fn pair(values: &[i64]) -> (i64, i64) {
    // clap enforces exactly two values
    (values[0], values[1])
}

impl Commands {
    /// Options for the `generate` subcommand, `None` for others
    pub fn generate_options(&self) -> Option<GenerateOptions> {
        match self {
            Commands::Generate {
                out_dir,
                seed,
                input_range,
                weight_range,
                bias,
                no_clean,
                limit,
                dry_run,
                per_config_seed,
                ..
            } => Some(GenerateOptions {
                out_dir: out_dir.clone(),
                seed: *seed,
                input_range: pair(input_range),
                weight_range: pair(weight_range),
                bias: *bias,
                clean: !no_clean,
                limit: *limit,
                dry_run: *dry_run,
                seed_policy: if *per_config_seed {
                    SeedPolicy::PerConfig
                } else {
                    SeedPolicy::Shared
                },
            }),
            Commands::Headers { .. } => None,
        }
    }
}

/// Execute a parsed command line
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Generate { param_file, .. } => {
            let space = ParameterSpace::load(param_file)?;
            if let Some(options) = cli.command.generate_options() {
                generate_data(&space, &options, &ReferenceConvTranspose::new())?;
            }
        }
        Commands::Headers {
            csv,
            exp_data,
            output,
        } => {
            let options = HeaderOptions {
                csv: csv.clone(),
                exp_data: exp_data.clone(),
                output: output.clone(),
            };
            generate_headers(&options)?;
        }
    }
    Ok(())
}
