use deconv_bench::header::SELECTOR_FILE_NAME;
use deconv_bench::io::{load_weight_listing, parse_weight_listing};
use deconv_bench::pipeline::{CONFIGS_DIR, CONFIGS_FILE, EXP_DATA_DIR};
use deconv_bench::*;
use std::fs;

fn generate(root: &std::path::Path) {
    let space = ParameterSpace::new([vec![3, 5], vec![1], vec![3], vec![3], vec![1], vec![1, 2]]);
    let options = GenerateOptions {
        out_dir: root.to_path_buf(),
        seed: 7,
        ..Default::default()
    };
    generate_data(&space, &options, &ReferenceConvTranspose).unwrap();
}

#[test]
fn test_headers_from_generated_data() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("deconv_data");
    generate(&data);

    let options = HeaderOptions {
        csv: data.join(CONFIGS_DIR).join(CONFIGS_FILE),
        exp_data: data.join(EXP_DATA_DIR),
        output: dir.path().join("generated_configs"),
    };
    let report = generate_headers(&options).unwrap();
    assert_eq!(report.headers.len(), 4);
    assert_eq!(report.skipped_rows, 0);
    assert!(report.headers.iter().all(|h| h.files.all_present()));

    let first = &report.headers[0];
    assert_eq!(first.file_name(), "deconv_top_K3_S1_H3_W3_CI1_CO3_P1.hpp");
    assert_eq!(
        first.variants,
        vec![Parallelism::new(1, 1), Parallelism::new(3, 1)]
    );

    // weights file has exactly CI*CO*K*K = N values, so packing is a straight copy
    let weights = load_weight_listing(first.files.weights.as_ref().unwrap()).unwrap();
    assert_eq!(weights.len(), 27);
    for kernel in &first.kernels {
        assert_eq!(kernel.normalization(), Normalization::AsIs);
        let packed: Vec<u8> = kernel.values().collect();
        let expected: Vec<u8> = weights.iter().map(|&w| (w & 0xFF) as u8).collect();
        assert_eq!(packed, expected);
    }

    let text = fs::read_to_string(&first.path).unwrap();
    assert!(text.contains("KERNEL[27][1][1]"));
    assert!(text.contains("KERNEL[9][3][1]"));
    let first_line = format!(
        "\t{{{{0x{:02x},}},{{0x{:02x},}},{{0x{:02x},}}}},",
        weights[0], weights[1], weights[2]
    );
    assert!(text.contains(&first_line), "missing {first_line}");

    let selector = fs::read_to_string(options.output.join(SELECTOR_FILE_NAME)).unwrap();
    assert_eq!(selector.matches("#include").count(), 5);
    assert!(selector.contains("DECONV_CFG_IDX_3"));
}

#[test]
fn test_headers_without_exp_data_use_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("configs.csv");
    fs::write(
        &csv,
        "input_size,in_channels,out_channels,kernel_size,stride,padding\n1,1,5,1,1,0\n",
    )
    .unwrap();
    let options = HeaderOptions {
        csv,
        exp_data: dir.path().join("missing"),
        output: dir.path().join("out"),
    };
    let report = generate_headers(&options).unwrap();
    let header = &report.headers[0];
    assert_eq!(header.files, pipeline::DataFiles::default());

    // PE candidates for CO=5 are 1 and 5
    assert_eq!(header.kernels.len(), 2);
    for kernel in &header.kernels {
        assert_eq!(kernel.normalization(), Normalization::Fallback);
        assert_eq!(kernel.values().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }
    let text = fs::read_to_string(&header.path).unwrap();
    assert!(text.contains("\t{{0x00,},{0x01,},{0x02,},{0x03,},{0x04,}},\n"));
}

#[test]
fn test_short_listing_is_padded() {
    let dir = tempfile::tempdir().unwrap();
    let exp = dir.path().join("exp");
    fs::create_dir_all(&exp).unwrap();
    let csv = dir.path().join("configs.csv");
    fs::write(
        &csv,
        "input_size,in_channels,out_channels,kernel_size,stride,padding\n3,2,4,1,1,0\n",
    )
    .unwrap();
    fs::write(
        exp.join("deconv_3x3_in2_out4_k1_s1_p0_weights.csv"),
        "0x10 0x20 foo 30\n",
    )
    .unwrap();

    let report = generate_headers(&HeaderOptions {
        csv,
        exp_data: exp,
        output: dir.path().join("out"),
    })
    .unwrap();
    let header = &report.headers[0];
    assert!(header.files.weights.is_some());
    assert!(!header.files.all_present());

    let pe2 = header
        .kernels
        .iter()
        .find(|k| k.parallelism() == Parallelism::new(2, 1))
        .unwrap();
    assert_eq!(pe2.outer_dim(), 4);
    assert_eq!(pe2.normalization(), Normalization::Padded { supplied: 3 });
    assert_eq!(pe2.values().collect::<Vec<_>>(), vec![16, 32, 30, 0, 0, 0, 0, 0]);
}

#[test]
fn test_table_with_only_invalid_rows() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("configs.csv");
    fs::write(
        &csv,
        "input_size,in_channels,out_channels,kernel_size,stride,padding\n0,1,1,1,1,0\n",
    )
    .unwrap();
    let err = generate_headers(&HeaderOptions {
        csv,
        exp_data: dir.path().join("exp"),
        output: dir.path().join("out"),
    })
    .unwrap_err();
    assert!(matches!(err, DeconvError::InvalidConfig(_)));
}

#[test]
fn test_listing_tokens() {
    assert_eq!(parse_weight_listing("0x10 0x20 foo 30"), vec![16, 32, 30]);
}
