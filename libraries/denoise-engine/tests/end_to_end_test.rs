//! End-to-end noise measurement and reduction at 48 kHz
//!
//! Five seconds of mono white noise at -40 dBFS, with a 1 kHz tone and a
//! 9 kHz tone between 1 s and 4 s so both bands carry signal.

use denoise_dsp::value_to_decibel;
use denoise_engine::{
    CrossoverInfo, Direction, MultiBandNoiseFilter, NoiseReport, NrDynamicsFactory,
    NrMeasurementSettings, TimingSettings,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;

const SAMPLE_RATE: f64 = 48000.0;
const NOISE_RMS: f64 = 0.01;

// ========== Helper Functions ==========

fn seconds(time: f64) -> usize {
    (time * SAMPLE_RATE) as usize
}

fn scenario() -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let amplitude = NOISE_RMS * 3f64.sqrt();
    let tone = seconds(1.0)..seconds(4.0);

    (0..seconds(5.0))
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            let mut sample = rng.gen_range(-amplitude..amplitude);
            if tone.contains(&i) {
                sample += (2.0 * PI * 1000.0 * t).sin() + 0.7 * (2.0 * PI * 9000.0 * t).sin();
            }
            sample
        })
        .collect()
}

fn rms(samples: &[f64]) -> f64 {
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

fn region_attenuation_db(input: &[f64], output: &[f64], from: f64, to: f64) -> f64 {
    let range = seconds(from)..seconds(to);
    value_to_decibel(rms(&input[range.clone()])) - value_to_decibel(rms(&output[range]))
}

fn run(input: &[f64]) -> (Vec<f64>, NoiseReport) {
    let crossover = CrossoverInfo::new(Direction::Downward, 2, [4500.0]).unwrap();
    // Short release so the gain closes again well before the trailing region
    let timings = TimingSettings {
        release_time: vec![0.03, 0.015],
        ..Default::default()
    }
    .to_timings(&crossover)
    .unwrap();
    let measurement = NrMeasurementSettings {
        min_sn_ratio_db: 30.0,
        max_sn_ratio_db: 75.0,
        ..Default::default()
    };
    let dynamics = NrDynamicsFactory::subtraction(0.0, 0.25).unwrap();
    let filter = MultiBandNoiseFilter::new(crossover, measurement, dynamics, timings).unwrap();

    let mut samples = input.to_vec();
    let report = filter.filter(&mut samples, 1, SAMPLE_RATE).unwrap();
    (samples, report)
}

// ========== Scenario ==========

#[test]
fn noise_floor_is_measured_per_band() {
    let input = scenario();
    let (_, report) = run(&input);

    assert_eq!(report.bands.len(), 2);
    let low = &report.bands[0];
    let high = &report.bands[1];
    assert_eq!((low.lower_hz, low.upper_hz), (20.0, 4500.0));
    assert_eq!((high.lower_hz, high.upper_hz), (4500.0, 24000.0));

    // Share of the -40 dBFS floor that passes each zero-phase crossover branch
    let low_db = value_to_decibel(low.noise_level.unwrap());
    let high_db = value_to_decibel(high.noise_level.unwrap());
    assert!((low_db + 48.1).abs() < 3.0, "low band noise {:.1} dB", low_db);
    assert!((high_db + 41.3).abs() < 3.0, "high band noise {:.1} dB", high_db);

    let combined_db = value_to_decibel(report.combined_noise_level(0).unwrap());
    assert!(
        (combined_db + 40.0).abs() < 3.0,
        "combined noise {:.1} dB",
        combined_db
    );
}

#[test]
fn noise_only_regions_are_attenuated() {
    let input = scenario();
    let (output, _) = run(&input);

    let leading = region_attenuation_db(&input, &output, 0.1, 0.4);
    let trailing = region_attenuation_db(&input, &output, 4.6, 4.9);
    assert!(leading >= 20.0, "leading region attenuated {:.1} dB", leading);
    assert!(trailing >= 20.0, "trailing region attenuated {:.1} dB", trailing);
}

#[test]
fn tone_passes_through() {
    let input = scenario();
    let (output, report) = run(&input);
    assert!(report.latency_samples > 0);

    // Within 1 dB over the steady part of the tone
    let loss = region_attenuation_db(&input, &output, 1.5, 3.5);
    assert!(loss.abs() < 1.0, "tone changed by {:.2} dB", loss);
}

#[test]
fn digital_silence_at_the_edges() {
    let mut input = scenario();
    let silent_edge = seconds(0.5);
    let len = input.len();
    input[..silent_edge].fill(0.0);
    input[len - silent_edge..].fill(0.0);

    let (output, report) = run(&input);

    assert!(output.iter().all(|s| s.is_finite()));
    for band in &report.bands {
        let noise = band.noise_level.unwrap();
        assert!(noise.is_finite() && noise > 0.0);
        // Clamped to 30..75 dB below the loudest window
        let noise_db = value_to_decibel(noise);
        assert!(noise_db > -85.0 && noise_db < -30.0, "noise {:.1} dB", noise_db);
    }
    let leading = rms(&output[seconds(0.1)..seconds(0.4)]);
    let trailing = rms(&output[seconds(4.6)..seconds(4.9)]);
    assert!(leading < 1e-6, "leading silence rms {:e}", leading);
    assert!(trailing < 1e-6, "trailing silence rms {:e}", trailing);
}
