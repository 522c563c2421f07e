use deconv_bench::config::cartesian_product;
use deconv_bench::packer::{normalize_weights, required_elements};
use deconv_bench::parallelism::divisors;
use deconv_bench::{DeconvConfig, Normalization, PackedKernel, Parallelism, ParameterSpace, pe_simd_configs};
use proptest::prelude::*;

/// Configuration together with a (PE, SIMD) pair that divides it
fn config_and_parallelism() -> impl Strategy<Value = (DeconvConfig, Parallelism)> {
    (1usize..=8, 1usize..=8, 1usize..=4).prop_flat_map(|(ci, co, k)| {
        let pes = divisors(co);
        let simds = divisors(ci);
        (
            Just(DeconvConfig::new(3, ci, co, k, 1, 0).unwrap()),
            proptest::sample::select(pes),
            proptest::sample::select(simds),
        )
            .prop_map(|(cfg, pe, simd)| (cfg, Parallelism::new(pe, simd)))
    })
}

proptest! {
    #[test]
    fn prop_packer_emits_exactly_n(
        (cfg, par) in config_and_parallelism(),
        weights in proptest::collection::vec(0i64..1000, 0..600),
    ) {
        let packed = PackedKernel::pack(&cfg, par, &weights);
        let n = required_elements(&cfg, par).unwrap();
        prop_assert_eq!(packed.len(), n);
        prop_assert_eq!(packed.values().count(), n);
        prop_assert!(packed.tiles().iter().all(|t| t.len() == par.pe
            && t.iter().all(|s| s.len() == par.simd)));
    }

    #[test]
    fn prop_padding_law(
        (cfg, par) in config_and_parallelism(),
        seed in proptest::collection::vec(0i64..256, 1..50),
    ) {
        let n = required_elements(&cfg, par).unwrap();
        prop_assume!(seed.len() < n);
        let values: Vec<u8> = PackedKernel::pack(&cfg, par, &seed).values().collect();
        let head: Vec<u8> = seed.iter().map(|&v| v as u8).collect();
        prop_assert_eq!(&values[..seed.len()], &head[..]);
        prop_assert!(values[seed.len()..].iter().all(|&v| v == 0));
    }

    #[test]
    fn prop_truncation_law(
        (cfg, par) in config_and_parallelism(),
        extra in 1usize..20,
    ) {
        let n = required_elements(&cfg, par).unwrap();
        let long: Vec<i64> = (0..(n + extra) as i64).map(|i| i * 7 + 3).collect();
        let (normalized, outcome) = normalize_weights(&long, n);
        prop_assert_eq!(&normalized[..], &long[..n]);
        prop_assert_eq!(outcome, Normalization::Truncated { supplied: n + extra });
    }

    #[test]
    fn prop_quantization_law(
        (cfg, par) in config_and_parallelism(),
        weights in proptest::collection::vec(0i64..100_000, 1..300),
    ) {
        let packed = PackedKernel::pack(&cfg, par, &weights);
        for (got, &src) in packed.values().zip(&weights) {
            prop_assert_eq!(i64::from(got), src % 256);
        }
    }

    #[test]
    fn prop_divisor_law(ci in 1usize..64, co in 1usize..64) {
        let cfg = DeconvConfig::new(3, ci, co, 3, 1, 1).unwrap();
        let pairs = pe_simd_configs(&cfg);
        prop_assert!(!pairs.is_empty());
        prop_assert!(pairs.contains(&Parallelism::new(1, 1)));
        for p in pairs {
            prop_assert_eq!(co % p.pe, 0);
            prop_assert_eq!(ci % p.simd, 0);
        }
    }

    #[test]
    fn prop_enumerator_product_and_order(
        lists in proptest::collection::vec(proptest::collection::vec(1i64..5, 0..4), 6)
    ) {
        let expected_len: usize = lists.iter().map(Vec::len).product();
        let product = cartesian_product(&lists);
        prop_assert_eq!(product.len(), expected_len);

        let values: [Vec<i64>; 6] = lists.clone().try_into().unwrap();
        let configs = ParameterSpace::new(values).enumerate().unwrap();
        prop_assert_eq!(configs.len(), expected_len);

        // last key varies fastest
        if lists[5].len() >= 2 && product.len() >= 2 {
            let (a, b) = (&product[0], &product[1]);
            prop_assert_eq!(&a[..5], &b[..5]);
        }
        for (combo, cfg) in product.iter().zip(&configs) {
            let fields: Vec<i64> = cfg.values().iter().map(|&v| v as i64).collect();
            prop_assert_eq!(combo, &fields);
        }
    }
}
