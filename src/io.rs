use crate::config::DeconvConfig;
use crate::error::Result;
use crate::tensor::{Tensor, TensorKind};
use log::{debug, warn};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Separator between dimensions in a shapes record
pub const SHAPE_SEPARATOR: char = 'x';

// ===== CONFIGURATION TABLE =====

/// One row of the configuration table, before validation
#[derive(Debug, Deserialize)]
struct ConfigRow {
    input_size: i64,
    in_channels: i64,
    out_channels: i64,
    kernel_size: i64,
    stride: i64,
    /// Empty means `kernel_size - stride`
    padding: Option<i64>,
}

/// Result of reading a configuration table
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigTable {
    /// Valid configurations in file order
    pub configs: Vec<DeconvConfig>,
    /// Rows that failed to parse or validate
    pub skipped: usize,
}

/// Write the configuration table, one row per configuration
///
/// Columns: `input_size,in_channels,out_channels,kernel_size,stride,padding`.
/// Parent directories are created as needed.
pub fn write_configs_csv<P: AsRef<Path>>(path: P, configs: &[DeconvConfig]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    if configs.is_empty() {
        writer.write_record(crate::config::PARAMETER_KEYS)?;
    }
    for cfg in configs {
        writer.serialize(cfg)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a configuration table written by [`write_configs_csv`]
///
/// Rows that don't parse, or that describe an invalid layer, are logged and
/// skipped.
pub fn read_configs_csv<P: AsRef<Path>>(path: P) -> Result<ConfigTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut table = ConfigTable::default();

    for (line, row) in reader.deserialize::<ConfigRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping unparsable row {}: {e}", line + 1);
                table.skipped += 1;
                continue;
            }
        };
        let values = [
            row.input_size,
            row.in_channels,
            row.out_channels,
            row.kernel_size,
            row.stride,
        ];
        let parsed = match row.padding {
            Some(padding) => {
                let [h, ci, co, k, s] = values;
                DeconvConfig::from_values([h, ci, co, k, s, padding])
            }
            None => DeconvConfig::from_values_derived_padding(values),
        };
        match parsed {
            Ok(cfg) => {
                debug!("Loaded: {cfg}");
                table.configs.push(cfg);
            }
            Err(e) => {
                warn!("Invalid row {} {values:?} padding {:?}: {e}", line + 1, row.padding);
                table.skipped += 1;
            }
        }
    }
    Ok(table)
}

// ===== TENSOR FILES =====

/// One integer per line, row-major
pub fn save_flat_csv<P: AsRef<Path>>(path: P, tensor: &Tensor) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in &tensor.data {
        writeln!(out, "{v}")?;
    }
    out.flush()?;
    Ok(())
}

/// `name,DIMxDIMx...` per tensor, in the order given
pub fn save_shapes_csv<P: AsRef<Path>>(path: P, shapes: &[(TensorKind, &Tensor)]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for (kind, tensor) in shapes {
        writeln!(
            out,
            "{},{}",
            kind.shape_label(),
            tensor.shape_string(SHAPE_SEPARATOR)
        )?;
    }
    out.flush()?;
    Ok(())
}

// ===== WEIGHT LISTINGS =====

/// Parse one listing token: `0x..` hex, decimal, or float truncated toward zero
///
/// Values wider than 64 bits keep their low 64 bits, so every numeric token
/// yields exactly one value and its low byte survives.
fn parse_token(token: &str) -> Option<i64> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return parse_hex(hex);
    }
    if let Ok(v) = token.parse::<i128>() {
        return Some(v as i64);
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(truncate_float)
}

/// Unsigned hex digits, no sign, reduced to the low 64 bits
fn parse_hex(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let low = &digits[digits.len().saturating_sub(16)..];
    u64::from_str_radix(low, 16).ok().map(|v| v as i64)
}

/// Truncate toward zero, reduced to the low 64 bits
fn truncate_float(f: f64) -> i64 {
    let t = f.trunc();
    // at and above 2^127 the ulp exceeds 2^64, so the low 64 bits are zero
    if t.abs() >= 2f64.powi(127) {
        0
    } else {
        t as i128 as i64
    }
}

/// Integers in a comma/whitespace separated weight listing
///
/// Tokens that aren't numbers (headers, labels) are skipped.
pub fn parse_weight_listing(text: &str) -> Vec<i64> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(parse_token)
        .collect()
}

pub fn load_weight_listing<P: AsRef<Path>>(path: P) -> Result<Vec<i64>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_weight_listing(&text))
}
