//! WAV reading and writing with samples normalized to `[-1, 1]`

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Interleaved samples plus the format they were read in
#[derive(Debug, Clone)]
pub struct WavAudio {
    pub spec: WavSpec,
    pub samples: Vec<f32>,
}

impl WavAudio {
    pub fn channels(&self) -> usize {
        self.spec.channels as usize
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from(self.spec.sample_rate)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels().max(1)
    }
}

/// Full scale of a signed integer sample with `bits` bits
fn full_scale(bits: u16) -> f32 {
    (1i64 << (bits - 1)) as f32
}

pub fn read_wav(path: &Path) -> Result<WavAudio> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("{} declares no channels", path.display());
    }

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        SampleFormat::Int => {
            if !(8..=32).contains(&spec.bits_per_sample) {
                bail!("unsupported sample size of {} bits", spec.bits_per_sample);
            }
            let scale = full_scale(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .with_context(|| format!("failed to decode {}", path.display()))?;

    tracing::debug!(
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "Read WAV file"
    );
    Ok(WavAudio { spec, samples })
}

/// Write `samples` in `spec`'s format; integer output is rounded and clipped
pub fn write_wav(path: &Path, spec: WavSpec, samples: &[f32]) -> Result<()> {
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;

    match spec.sample_format {
        SampleFormat::Float => {
            for &sample in samples {
                writer.write_sample(sample)?;
            }
        }
        SampleFormat::Int => {
            let scale = full_scale(spec.bits_per_sample);
            let maximum = scale - 1.0;
            let mut clipped = 0usize;
            for &sample in samples {
                let value = (sample * scale).round();
                if value > maximum || value < -scale {
                    clipped += 1;
                }
                writer.write_sample(value.clamp(-scale, maximum) as i32)?;
            }
            if clipped > 0 {
                tracing::warn!(clipped, "Clipped samples while writing integer WAV");
            }
        }
    }

    writer
        .finalize()
        .with_context(|| format!("failed to finish {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale() {
        assert_eq!(full_scale(16), 32768.0);
        assert_eq!(full_scale(8), 128.0);
    }

    #[test]
    fn test_integer_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcm16.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let samples = vec![0.0, 0.5, -0.5, -1.0, 1.5, 0.25];

        write_wav(&path, spec, &samples).unwrap();
        let audio = read_wav(&path).unwrap();

        assert_eq!(audio.spec, spec);
        assert_eq!(audio.frames(), 3);
        assert_eq!(audio.samples[1], 0.5);
        assert_eq!(audio.samples[3], -1.0);
        // Clipped to the largest positive value
        assert_eq!(audio.samples[4], 32767.0 / 32768.0);
    }

    #[test]
    fn test_float_samples_pass_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let samples = vec![0.125, -0.75, 0.0];

        write_wav(&path, spec, &samples).unwrap();
        let audio = read_wav(&path).unwrap();

        assert_eq!(audio.samples, samples);
        assert_eq!(audio.sample_rate(), 48000.0);
    }

    #[test]
    fn test_missing_file_names_path() {
        let error = read_wav(Path::new("/nonexistent/input.wav")).unwrap_err();
        assert!(format!("{:#}", error).contains("/nonexistent/input.wav"));
    }
}
