//! C++ header text for HLS deconvolution builds
//!
//! Each configuration gets a `deconv_top_<tag>.hpp` holding its scalar
//! constants and one packed `KERNEL` per PE/SIMD variant. The first variant is
//! active (`#if 1`); the rest sit behind `#elif 0` so they can be switched in
//! by hand. A selector `deconv_top.hpp` includes exactly one of them.

use crate::config::DeconvConfig;
use crate::packer::PackedKernel;
use std::fmt::Write;

pub const SELECTOR_FILE_NAME: &str = "deconv_top.hpp";
const SELECTOR_GUARD: &str = "DECONV_TOP_SELECTOR_HPP";
const CONFIG_GUARD: &str = "DECONV_TOP_HPP";

/// `static TW const KERNEL[outer][PE][SIMD] = {...};`
pub fn render_kernel(kernel: &PackedKernel) -> String {
    let par = kernel.parallelism();
    let mut out = format!(
        "static TW const  KERNEL[{}][{}][{}] = {{\n",
        kernel.outer_dim(),
        par.pe,
        par.simd
    );
    for lanes in kernel.tiles() {
        let groups: Vec<String> = lanes
            .iter()
            .map(|simd| {
                let bytes: Vec<String> = simd.iter().map(|b| format!("0x{b:02x}")).collect();
                format!("{{{},}}", bytes.join(","))
            })
            .collect();
        let _ = writeln!(out, "\t{{{}}},", groups.join(","));
    }
    out.push_str("};\n");
    out
}

/// Full configuration header with every packed variant
pub fn render_config_header(cfg: &DeconvConfig, kernels: &[PackedKernel]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#ifndef {CONFIG_GUARD}");
    let _ = writeln!(out, "#define {CONFIG_GUARD}");
    out.push('\n');
    out.push_str("#include <ap_int.h>\n");
    out.push_str("#include <hls_stream.h>\n");
    out.push_str("#include <hls_vector.h>\n");
    out.push('\n');

    let h = cfg.input_size();
    let constants = [
        ("K", cfg.kernel_size(), "kernel Size"),
        ("S", cfg.stride(), "stride"),
        ("P", cfg.padding(), "padding"),
        ("H", h, "IFM height"),
        ("W", h, "IFM Width"),
        ("CI", cfg.in_channels(), "input channels"),
        ("CO", cfg.out_channels(), "output channels"),
    ];
    for (name, value, note) in constants {
        let _ = writeln!(out, "constexpr unsigned  {name} = {value};\t\t// {note}");
    }
    out.push('\n');
    out.push_str("using  TW = ap_uint< 8>;\n");
    out.push_str("using  TI = ap_uint< 4>;\n");
    out.push_str("using  TO = ap_uint<16>;\n");
    out.push('\n');

    for (i, kernel) in kernels.iter().enumerate() {
        let par = kernel.parallelism();
        out.push_str(if i == 0 { "#if 1\n" } else { "#elif 0\n" });
        let _ = writeln!(out, "constexpr unsigned  PE   = {};", par.pe);
        let _ = writeln!(out, "constexpr unsigned  SIMD = {};", par.simd);
        out.push('\n');
        out.push_str(&render_kernel(kernel));
        out.push('\n');
    }
    if !kernels.is_empty() {
        out.push_str("#endif\n\n");
    }

    out.push_str("void deconv_top(\n");
    out.push_str("    hls::stream<hls::vector<TI, SIMD>> &src,\n");
    out.push_str("    hls::stream<hls::vector<TO, PE>>   &dst\n");
    out.push_str(");\n");
    out.push('\n');
    let _ = writeln!(out, "#endif");
    out
}

/// Selector header including one configuration header by symbol
///
/// `DECONV_CFG_IDX_<i>` or `DECONV_CFG_<tag>` picks a configuration; with
/// neither defined the first one is used.
pub fn render_selector_header(configs: &[DeconvConfig]) -> String {
    let mut lines = vec![
        "// Auto-generated selector header for deconvolution configurations".to_string(),
        "// Usage: define one of the following macros before including this file:".to_string(),
    ];
    for (idx, cfg) in configs.iter().enumerate() {
        lines.push(format!("//   - DECONV_CFG_IDX_{idx}"));
        lines.push(format!("//   - DECONV_CFG_{}", cfg.param_tag()));
    }
    lines.push(String::new());
    lines.push(format!("#ifndef {SELECTOR_GUARD}"));
    lines.push(format!("#define {SELECTOR_GUARD}"));
    lines.push(String::new());

    match configs.first() {
        Some(first) => {
            for (idx, cfg) in configs.iter().enumerate() {
                let directive = if idx == 0 { "#if" } else { "#elif" };
                lines.push(format!(
                    "{directive} defined(DECONV_CFG_IDX_{idx}) || defined(DECONV_CFG_{})",
                    cfg.param_tag()
                ));
                lines.push(format!("#include \"{}\"", cfg.header_file_name()));
            }
            lines.push("#else".to_string());
            lines.push(format!("#include \"{}\"", first.header_file_name()));
            lines.push("#endif".to_string());
        }
        None => lines.push(
            "#error \"No configuration headers were generated. Please generate configurations first.\""
                .to_string(),
        ),
    }

    lines.push(String::new());
    lines.push(format!("#endif // {SELECTOR_GUARD}"));
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
