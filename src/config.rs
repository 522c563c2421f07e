//! Deconvolution layer configurations and the parameter sweep that produces them
//!
//! A [`ParameterSpace`] maps each of the six layer parameters to a list of
//! candidate values. [`ParameterSpace::enumerate`] expands it into the ordered
//! cartesian product of [`DeconvConfig`]s. The order is part of the
//! reproducibility contract: the tensor generator consumes random draws in
//! exactly this sequence.

use crate::error::{DeconvError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

/// Parameter names in sweep order. The last key varies fastest.
pub const PARAMETER_KEYS: [&str; 6] = [
    "input_size",
    "in_channels",
    "out_channels",
    "kernel_size",
    "stride",
    "padding",
];

// ===== CONFIGURATION RECORD =====

/// One transposed-convolution layer under test
///
/// Inputs are square: `H = W = input_size`. Fields are validated once in
/// [`DeconvConfig::new`] and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeconvConfig {
    input_size: usize,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl DeconvConfig {
    /// Build a validated configuration
    ///
    /// # Errors
    /// `InvalidConfig` if any of size, channels, kernel or stride is zero.
    pub fn new(
        input_size: usize,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let fields = [
            ("input_size", input_size),
            ("in_channels", in_channels),
            ("out_channels", out_channels),
            ("kernel_size", kernel_size),
            ("stride", stride),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(DeconvError::InvalidConfig(format!(
                "{name} must be positive"
            )));
        }
        Ok(DeconvConfig {
            input_size,
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        })
    }

    /// Build a configuration whose padding is derived as `kernel - stride`
    ///
    /// # Errors
    /// `InvalidConfig` if the derived padding would be negative, or if any
    /// other field is zero.
    pub fn with_derived_padding(
        input_size: usize,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
    ) -> Result<Self> {
        let padding = kernel_size.checked_sub(stride).ok_or_else(|| {
            DeconvError::InvalidConfig(format!(
                "derived padding K - S = {kernel_size} - {stride} is negative"
            ))
        })?;
        Self::new(
            input_size,
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        )
    }

    /// Build a configuration from signed values, as read from JSON or CSV
    ///
    /// # Errors
    /// `InvalidConfig` if any value is negative or fails [`DeconvConfig::new`].
    pub fn from_values(values: [i64; 6]) -> Result<Self> {
        let [h, ci, co, k, s, p] = unsigned_fields(values)?;
        Self::new(h, ci, co, k, s, p)
    }

    /// Like [`DeconvConfig::from_values`] for a row with no padding column;
    /// padding is derived as in [`DeconvConfig::with_derived_padding`]
    ///
    /// # Errors
    /// `InvalidConfig` if any value is negative or `K < S`.
    pub fn from_values_derived_padding(values: [i64; 5]) -> Result<Self> {
        let [h, ci, co, k, s] = unsigned_fields(values)?;
        Self::with_derived_padding(h, ci, co, k, s)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }
    pub fn stride(&self) -> usize {
        self.stride
    }
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Fields in [`PARAMETER_KEYS`] order
    pub fn values(&self) -> [usize; 6] {
        [
            self.input_size,
            self.in_channels,
            self.out_channels,
            self.kernel_size,
            self.stride,
            self.padding,
        ]
    }

    /// Spatial output size `(H - 1) * S - 2P + K`
    ///
    /// # Errors
    /// `InvalidConfig` if the padding consumes the whole output.
    pub fn output_size(&self) -> Result<usize> {
        let full = (self.input_size - 1)
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(self.kernel_size))
            .ok_or_else(|| {
                DeconvError::InvalidConfig(format!("output size overflows for {self}"))
            })?;
        match self
            .padding
            .checked_mul(2)
            .and_then(|p| full.checked_sub(p))
        {
            Some(size) if size > 0 => Ok(size),
            _ => Err(DeconvError::InvalidConfig(format!(
                "padding {} leaves no output for {self}",
                self.padding
            ))),
        }
    }

    /// Stem shared by the per-configuration data files
    pub fn base_name(&self) -> String {
        format!(
            "deconv_{h}x{h}_in{}_out{}_k{}_s{}_p{}",
            self.in_channels,
            self.out_channels,
            self.kernel_size,
            self.stride,
            self.padding,
            h = self.input_size,
        )
    }

    /// Parameter tag used in header file names and selector symbols
    pub fn param_tag(&self) -> String {
        format!(
            "K{}_S{}_H{h}_W{h}_CI{}_CO{}_P{}",
            self.kernel_size,
            self.stride,
            self.in_channels,
            self.out_channels,
            self.padding,
            h = self.input_size,
        )
    }

    pub fn header_file_name(&self) -> String {
        format!("deconv_top_{}.hpp", self.param_tag())
    }
}

impl fmt::Display for DeconvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "K={}, S={}, H={h}, W={h}, CI={}, CO={}, P={}",
            self.kernel_size,
            self.stride,
            self.in_channels,
            self.out_channels,
            self.padding,
            h = self.input_size,
        )
    }
}

/// Signed values to `usize`, named after [`PARAMETER_KEYS`] in errors
fn unsigned_fields<const N: usize>(values: [i64; N]) -> Result<[usize; N]> {
    let mut fields = [0usize; N];
    for ((field, &value), name) in fields.iter_mut().zip(&values).zip(PARAMETER_KEYS) {
        *field = usize::try_from(value).map_err(|_| {
            DeconvError::InvalidConfig(format!("{name} must be non-negative, got {value}"))
        })?;
    }
    Ok(fields)
}

// ===== PARAMETER SPACE =====

/// Candidate values for each sweep parameter, indexed by [`PARAMETER_KEYS`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpace {
    values: [Vec<i64>; 6],
}

impl ParameterSpace {
    pub fn new(values: [Vec<i64>; 6]) -> Self {
        ParameterSpace { values }
    }

    /// Read a JSON parameter space from disk
    ///
    /// # Errors
    /// `Io` if the file can't be read, plus everything [`ParameterSpace::from_json_str`] reports.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON parameter space
    ///
    /// # Errors
    /// `Json` on malformed JSON, otherwise see [`ParameterSpace::from_value`].
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Validate a decoded JSON value
    ///
    /// Unknown keys are allowed but must still map to lists.
    ///
    /// # Errors
    /// - `Schema` if the value is not an object, any entry is not a list, or
    ///   a list element is not an integer
    /// - `MissingParameter` if one of [`PARAMETER_KEYS`] is absent
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            DeconvError::Schema(
                "parameter space must be an object mapping names to lists".to_string(),
            )
        })?;
        if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_array()) {
            return Err(DeconvError::Schema(format!(
                "parameter '{key}' must map to a list of values"
            )));
        }

        let mut values: [Vec<i64>; 6] = Default::default();
        for (slot, key) in values.iter_mut().zip(PARAMETER_KEYS) {
            let list = map
                .get(key)
                .and_then(Value::as_array)
                .ok_or_else(|| DeconvError::MissingParameter(key.to_string()))?;
            *slot = list
                .iter()
                .map(|v| {
                    v.as_i64().ok_or_else(|| {
                        DeconvError::Schema(format!(
                            "parameter '{key}' contains non-integer value {v}"
                        ))
                    })
                })
                .collect::<Result<_>>()?;
        }
        Ok(ParameterSpace { values })
    }

    pub fn values(&self, key_index: usize) -> &[i64] {
        &self.values[key_index]
    }

    /// Number of configurations the sweep will produce
    pub fn len(&self) -> usize {
        self.values.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand into the ordered cartesian product
    ///
    /// # Errors
    /// `InvalidConfig` on the first combination that fails validation.
    pub fn enumerate(&self) -> Result<Vec<DeconvConfig>> {
        cartesian_product(&self.values)
            .into_iter()
            .map(|combo| {
                let mut fields = [0i64; 6];
                fields.copy_from_slice(&combo);
                DeconvConfig::from_values(fields)
            })
            .collect()
    }
}

/// Cartesian product of `lists`, last list varying fastest
pub fn cartesian_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    let total: usize = lists.iter().map(Vec::len).product();
    let mut out = Vec::with_capacity(total);
    if total == 0 {
        return out;
    }

    let mut cursor = vec![0usize; lists.len()];
    for _ in 0..total {
        out.push(
            cursor
                .iter()
                .zip(lists)
                .map(|(&i, list)| list[i].clone())
                .collect(),
        );
        // odometer increment from the last position
        for pos in (0..lists.len()).rev() {
            cursor[pos] += 1;
            if cursor[pos] < lists[pos].len() {
                break;
            }
            cursor[pos] = 0;
        }
    }
    out
}
