//! Zero-phase band splitting and per-band filter chains
//!
//! A channel is copied into a padded buffer and split into bands by a
//! forward-backward Butterworth pass per crossover. The filtered part goes
//! to a fresh buffer, the remainder stays in the source, so the sum of all
//! bands reconstructs the input. Bands are queued to two worker threads
//! that run the filter chain and add their result to a shared accumulator.
//!
//! ```text
//!              ┌─► split @ f1 ─► band 1 ─┐
//!  channel ─► source ─► split @ f2 ─► band 2 ─┼─► workers ─► accumulator
//!              └──────────────── remainder ─┘
//! ```

use crate::chain::{BandMetadata, FilterFactory, FrequencyBand};
use crate::crossover::{CrossoverInfo, Direction};
use crate::error::{EngineError, Result};
use crate::pool::{Buffer, BufferSet, Handle};
use crossbeam_channel::{Receiver, Sender};
use denoise_dsp::{butterworth, Filter, PassType};
use serde::Serialize;
use std::f64::consts::{LN_2, PI};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lower edge of the lowest band
pub const LOW_BANDWIDTH_LIMIT: f64 = 20.0;

/// Precision, in bits, the padding must let the filter tails decay to
pub const PADDING_BITS: f64 = 25.0;

/// Buffers a channel leases at least / would like to hold
pub const MINIMUM_BUFFERS: usize = 3;
pub const PREFERRED_BUFFERS: usize = 5;

/// Worker threads per channel
pub const WORKERS: usize = 2;

const SLOW_BUFFER_WAIT: Duration = Duration::from_millis(100);

/// Levels measured in one band of one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandReport {
    pub channel: usize,
    pub lower_hz: f64,
    pub upper_hz: f64,
    /// Loudest measurement window, if the chain measured one
    pub peak_level: Option<f64>,
    /// Noise floor the reduction stage worked with
    pub noise_level: Option<f64>,
}

/// Filtered frames of one channel plus its band reports
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    pub samples: Vec<f64>,
    pub bands: Vec<BandReport>,
}

/// Samples of padding before and after the signal
///
/// Long enough for the slowest crossover's impulse response to decay by
/// [`PADDING_BITS`] bits through all crossovers.
pub fn padding_offset(crossover: &CrossoverInfo, sample_rate: f64) -> usize {
    let crossovers = crossover.len().max(1) as f64;
    let decay = LN_2 * crossover.order() as f64 * PADDING_BITS * crossovers * sample_rate * 0.5
        / (crossover.lowest() * PI);
    (0.5 + decay) as usize
}

/// Zero-phase split of `source` at `cutoff` (fraction of the sample rate)
///
/// The forward pass writes the filtered signal to `destination`, the
/// backward pass filters it again in reverse and subtracts the result from
/// `source`. Afterwards `source + destination` equals the original source.
pub fn split_band(
    source: &mut [f64],
    destination: &mut [f64],
    cutoff: f64,
    order: usize,
    pass_type: PassType,
) -> Result<()> {
    if source.len() != destination.len() {
        return Err(EngineError::BufferSizeMismatch {
            expected: source.len(),
            actual: destination.len(),
        });
    }
    let mut filter = butterworth::create(cutoff, order, pass_type)?;

    for (output, &input) in destination.iter_mut().zip(source.iter()) {
        *output = filter.filter(input);
    }
    filter.reset();
    for (output, remainder) in destination.iter_mut().zip(source.iter_mut()).rev() {
        let filtered = filter.filter(*output);
        *output = filtered;
        *remainder -= filtered;
    }
    Ok(())
}

struct BandTask {
    buffer: Buffer,
    band: FrequencyBand,
}

/// Splits channels into bands and runs the filter chain on each band
///
/// One instance serves every channel of a signal; each call to
/// [`filter_channel`](Self::filter_channel) leases its own buffers.
pub struct BandSplitFilterSet<'a> {
    pool: BufferSet,
    factories: &'a [Box<dyn FilterFactory>],
    crossover: &'a CrossoverInfo,
    sample_rate: f64,
    frame_count: usize,
    offset: usize,
    latency: usize,
}

impl<'a> BandSplitFilterSet<'a> {
    pub fn new(
        pool: BufferSet,
        factories: &'a [Box<dyn FilterFactory>],
        crossover: &'a CrossoverInfo,
        sample_rate: f64,
        frame_count: usize,
    ) -> Result<Self> {
        crossover.validate_for_sample_rate(sample_rate)?;
        let latency = factories.iter().map(|factory| factory.latency()).sum();
        Ok(Self {
            pool,
            factories,
            crossover,
            sample_rate,
            frame_count,
            offset: padding_offset(crossover, sample_rate),
            latency,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Sum of the latencies of all factories
    pub fn latency(&self) -> usize {
        self.latency
    }

    /// Length of every working buffer
    pub fn total_samples(&self) -> usize {
        self.frame_count + 2 * self.offset + self.latency
    }

    /// Where the filtered signal starts in the accumulator
    pub fn output_position(&self) -> usize {
        self.offset + self.latency
    }

    /// Filter one channel of `frame_count` samples
    pub fn filter_channel(&self, channel: usize, input: &[f64]) -> Result<ChannelOutput> {
        if input.len() != self.frame_count {
            return Err(EngineError::BufferSizeMismatch {
                expected: self.frame_count,
                actual: input.len(),
            });
        }
        let handle = self
            .pool
            .init(self.total_samples(), MINIMUM_BUFFERS, PREFERRED_BUFFERS)?;
        let result = self.run(channel, &handle, input);
        if result.is_err() {
            handle.panic();
        }
        handle.close();
        result
    }

    fn run(&self, channel: usize, handle: &Handle, input: &[f64]) -> Result<ChannelOutput> {
        let mut source = self.next_buffer(channel, handle)?;
        source.samples_mut()[self.offset..self.offset + self.frame_count].copy_from_slice(input);
        let accumulator = match self.next_buffer(channel, handle) {
            Ok(buffer) => Mutex::new(buffer),
            Err(e) => {
                handle.put(source);
                return Err(e);
            }
        };
        let reports = Mutex::new(Vec::with_capacity(self.crossover.band_count()));
        let (sender, receiver) = crossbeam_channel::unbounded::<BandTask>();

        let failures = thread::scope(|scope| -> Result<Vec<String>> {
            let mut workers = Vec::with_capacity(WORKERS);
            let mut receiver = Some(receiver);
            for number in 1..=WORKERS {
                let receiver = if number == WORKERS {
                    receiver.take()
                } else {
                    receiver.clone()
                };
                let Some(receiver) = receiver else {
                    break;
                };
                let accumulator = &accumulator;
                let reports = &reports;
                let worker = thread::Builder::new()
                    .name(format!("channel {} filters/{}", channel, number))
                    .spawn_scoped(scope, move || {
                        let result = self.filter_worker(channel, handle, receiver, accumulator, reports);
                        if result.is_err() {
                            handle.panic();
                        }
                        result
                    });
                match worker {
                    Ok(worker) => workers.push(worker),
                    Err(e) => {
                        handle.panic();
                        drop(sender);
                        handle.put(source);
                        return Err(e.into());
                    }
                }
            }

            let mut failures = Vec::new();
            if let Err(e) = self.split(channel, handle, source, &sender) {
                failures.push(format!("channel {} band split: {}", channel, e));
            }
            drop(sender);

            for (number, worker) in workers.into_iter().enumerate() {
                match worker.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        failures.push(format!("channel {} filters/{}: {}", channel, number + 1, e))
                    }
                    Err(_) => {
                        handle.panic();
                        failures.push(format!(
                            "channel {} filters/{}: worker panicked",
                            channel,
                            number + 1
                        ));
                    }
                }
            }
            Ok(failures)
        })?;

        let accumulator = accumulator.into_inner().unwrap_or_else(PoisonError::into_inner);
        if !failures.is_empty() {
            handle.put(accumulator);
            return Err(EngineError::Workers(failures));
        }

        let start = self.output_position();
        let samples = accumulator.samples()[start..start + self.frame_count].to_vec();
        handle.put(accumulator);

        let mut bands = reports.into_inner().unwrap_or_else(PoisonError::into_inner);
        bands.sort_by(|a, b| a.lower_hz.total_cmp(&b.lower_hz));
        Ok(ChannelOutput { samples, bands })
    }

    /// Split `source` at every crossover and queue all bands, the
    /// remainder last
    fn split(
        &self,
        channel: usize,
        handle: &Handle,
        mut source: Buffer,
        sender: &Sender<BandTask>,
    ) -> Result<()> {
        let nyquist = 0.5 * self.sample_rate;
        let (pass_type, crossovers): (PassType, Vec<f64>) = match self.crossover.direction() {
            Direction::Upward => (PassType::LowPass, self.crossover.frequencies().to_vec()),
            Direction::Downward => (
                PassType::HighPass,
                self.crossover.frequencies().iter().rev().copied().collect(),
            ),
        };
        let mut edge = match self.crossover.direction() {
            Direction::Upward => LOW_BANDWIDTH_LIMIT,
            Direction::Downward => nyquist,
        };

        for crossover in crossovers {
            let mut destination = match self.next_buffer(channel, handle) {
                Ok(buffer) => buffer,
                Err(e) => {
                    handle.put(source);
                    return Err(e);
                }
            };
            debug!(channel, crossover_hz = crossover, "Split band");
            if let Err(e) = split_band(
                source.samples_mut(),
                destination.samples_mut(),
                crossover / self.sample_rate,
                self.crossover.order(),
                pass_type,
            ) {
                handle.put(destination);
                handle.put(source);
                return Err(e);
            }
            let band = match self.crossover.direction() {
                Direction::Upward => FrequencyBand::new(edge, crossover),
                Direction::Downward => FrequencyBand::new(crossover, edge),
            };
            edge = crossover;
            if let Err(e) = submit(handle, sender, destination, band) {
                handle.put(source);
                return Err(e);
            }
        }

        let remainder = match self.crossover.direction() {
            Direction::Upward => FrequencyBand::new(edge, nyquist),
            Direction::Downward => FrequencyBand::new(LOW_BANDWIDTH_LIMIT, edge),
        };
        submit(handle, sender, source, remainder)
    }

    fn next_buffer(&self, channel: usize, handle: &Handle) -> Result<Buffer> {
        let started = Instant::now();
        let buffer = handle.get()?;
        let waited = started.elapsed();
        if waited > SLOW_BUFFER_WAIT {
            warn!(
                channel,
                waited_ms = waited.as_millis() as u64,
                "Waited for a free band buffer"
            );
        }
        Ok(buffer)
    }

    fn filter_worker(
        &self,
        channel: usize,
        handle: &Handle,
        receiver: Receiver<BandTask>,
        accumulator: &Mutex<Buffer>,
        reports: &Mutex<Vec<BandReport>>,
    ) -> Result<()> {
        for BandTask { mut buffer, band } in receiver.iter() {
            let result = self.apply_filters(channel, &mut buffer, band, accumulator);
            handle.put(buffer);
            let report = result?;
            reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(report);
        }
        Ok(())
    }

    /// Run every factory's filter over its window of the band, then add the
    /// band to the accumulator
    fn apply_filters(
        &self,
        channel: usize,
        buffer: &mut Buffer,
        band: FrequencyBand,
        accumulator: &Mutex<Buffer>,
    ) -> Result<BandReport> {
        info!(
            channel,
            "Apply filters for {:.0} to {:.0} Hz", band.lower, band.upper
        );
        let total = buffer.len();
        let (samples, markers) = buffer.split_mut();
        let mut metadata = BandMetadata::None;
        let mut report = BandReport {
            channel,
            lower_hz: band.lower,
            upper_hz: band.upper,
            peak_level: None,
            noise_level: None,
        };

        for factory in self.factories {
            let start = (self.offset + factory.start_offset()).min(total);
            let end = (self.offset + self.frame_count + factory.latency())
                .saturating_sub(factory.end_offset())
                .min(total)
                .max(start);
            let mut filter = factory.create_filter(metadata, band)?;
            filter.process(&mut samples[start..end], &mut markers[start..end])?;
            metadata = filter.metadata();
            match metadata {
                BandMetadata::MaxRms(level) => report.peak_level = Some(level),
                BandMetadata::NoiseLevel(level) => report.noise_level = Some(level),
                BandMetadata::None => {}
            }
        }

        let mut accumulator = accumulator.lock().unwrap_or_else(PoisonError::into_inner);
        for (sum, &sample) in accumulator.samples_mut().iter_mut().zip(samples.iter()) {
            *sum += sample;
        }
        Ok(report)
    }
}

fn submit(
    handle: &Handle,
    sender: &Sender<BandTask>,
    buffer: Buffer,
    band: FrequencyBand,
) -> Result<()> {
    sender.send(BandTask { buffer, band }).map_err(|e| {
        handle.put(e.into_inner().buffer);
        EngineError::Pool("all filter workers stopped".to_string())
    })
}
