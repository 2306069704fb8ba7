//! Property-based tests for gain curves and band splitting

use denoise_dsp::{value_to_decibel, PassType};
use denoise_engine::band_split::split_band;
use denoise_engine::NrDynamicsFactory;
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn dynamics_factory() -> impl Strategy<Value = NrDynamicsFactory> {
    prop_oneof![
        (0.0..20.0f64, 1.25..4.0f64)
            .prop_map(|(threshold, ratio)| NrDynamicsFactory::expansion(threshold, ratio).unwrap()),
        (-20.0..20.0f64, 0.0..0.9f64).prop_map(|(threshold, ratio)| {
            NrDynamicsFactory::subtraction(threshold, ratio).unwrap()
        }),
    ]
}

proptest! {
    #[test]
    fn gain_is_bounded(
        factory in dynamics_factory(),
        noise in 1e-6..0.5f64,
        level in 0.0..10.0f64,
    ) {
        let dynamics = factory.create(noise).unwrap();
        let gain = dynamics.gain(level);
        prop_assert!((0.0..=1.0).contains(&gain), "gain {}", gain);
    }

    #[test]
    fn gain_never_falls_with_level(
        factory in dynamics_factory(),
        noise in 1e-6..0.5f64,
        level in 1e-7..5.0f64,
        step in 1.0..100.0f64,
    ) {
        let dynamics = factory.create(noise).unwrap();
        let lower = dynamics.gain(level);
        let higher = dynamics.gain(level * step);
        prop_assert!(higher + 1e-12 >= lower, "{} then {}", lower, higher);
    }

    #[test]
    fn gain_vanishes_at_and_below_noise_level(
        threshold in -20.0..0.0f64,
        ratio in 0.0..0.9f64,
        noise in 1e-4..0.5f64,
    ) {
        let dynamics = NrDynamicsFactory::subtraction(threshold, ratio)
            .unwrap()
            .create(noise)
            .unwrap();
        prop_assert_eq!(dynamics.gain(dynamics.threshold()), 0.0);
        prop_assert_eq!(dynamics.gain(0.5 * dynamics.threshold()), 0.0);
    }

    #[test]
    fn band_split_reconstructs_input(
        seed in any::<u64>(),
        cutoff in 0.001..0.45f64,
        order in 1usize..=4,
        high_pass in any::<bool>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let original: Vec<f64> = (0..2048).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut source = original.clone();
        let mut band = vec![0.0; original.len()];
        let pass_type = if high_pass { PassType::HighPass } else { PassType::LowPass };

        split_band(&mut source, &mut band, cutoff, order, pass_type).unwrap();

        let residual = original
            .iter()
            .zip(source.iter().zip(band.iter()))
            .map(|(o, (s, b))| (o - s - b).abs())
            .fold(0.0, f64::max);
        prop_assert!(
            residual == 0.0 || value_to_decibel(residual) < -60.0,
            "residual {} dB",
            value_to_decibel(residual)
        );
    }
}
