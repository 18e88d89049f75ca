//! Spectral Path Generator
//!
//! Turns drained FIFO blocks into a display path of the live spectrum.
//!
//! # Pipeline
//!
//! 1. Accumulate: shift a rolling mono buffer (FFT size) left by the block
//!    length and append the block at the tail.
//! 2. Transform: Blackman-Harris window, forward FFT, per-bin magnitude in
//!    dB clamped at the floor.
//! 3. Map: one point per pixel column, log frequency on x, dB on y.
//! 4. Publish: push the path into a bounded latest-wins [`PathQueue`].
//!
//! Runs on the analysis thread. Besides the paths it publishes, it
//! allocates only at construction and when the incoming block size changes.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::coefficients::gain_to_decibels;
use crate::error::DspError;
use crate::fifo::FifoConsumer;
use crate::path::{map_from_log10, AnalysisArea, Path, PathQueue, Point};
use crate::settings::{MAX_FREQUENCY, MIN_FREQUENCY};

/// Default analyzer floor (dB)
pub const DEFAULT_FLOOR_DB: f32 = -48.0;

/// FFT length as a power of two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FftOrder {
    /// 2048 points, ~43 ms at 48 kHz
    #[default]
    Order2048,
    Order4096,
    /// 8192 points, ~5.9 Hz bin width at 48 kHz
    Order8192,
}

impl FftOrder {
    pub fn order(self) -> u32 {
        match self {
            FftOrder::Order2048 => 11,
            FftOrder::Order4096 => 12,
            FftOrder::Order8192 => 13,
        }
    }

    pub fn size(self) -> usize {
        1 << self.order()
    }
}

/// 4-term Blackman-Harris window of length `size`
fn blackman_harris(size: usize) -> Vec<f32> {
    const A0: f64 = 0.35875;
    const A1: f64 = 0.48829;
    const A2: f64 = 0.14128;
    const A3: f64 = 0.01168;

    let denom = (size.max(2) - 1) as f64;
    (0..size)
        .map(|n| {
            let phase = 2.0 * std::f64::consts::PI * n as f64 / denom;
            (A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos() - A3 * (3.0 * phase).cos()) as f32
        })
        .collect()
}

/// Per-channel spectrum analyzer producing display paths
pub struct SpectralPathGenerator {
    order: FftOrder,
    floor_db: f64,
    /// Most recent `fft_size` samples, oldest first
    rolling: Vec<f32>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Magnitude per bin for the lower half of the spectrum
    magnitudes_db: Vec<f64>,
    /// Scratch block for draining the FIFO
    block: Vec<f32>,
    queue: Arc<PathQueue>,
    /// Set once `magnitudes_db` holds a real transform
    transformed: bool,
}

impl SpectralPathGenerator {
    /// Create a generator
    ///
    /// # Arguments
    /// * `order` - FFT length
    /// * `floor_db` - Lowest magnitude shown, e.g. -48 dB
    /// * `queue_capacity` - Finished paths kept for the renderer (at least 1)
    pub fn new(order: FftOrder, floor_db: f32, queue_capacity: usize) -> Result<Self, DspError> {
        if !(floor_db.is_finite() && floor_db < 0.0) {
            return Err(DspError::InvalidFloor(floor_db));
        }
        let queue = Arc::new(PathQueue::new(queue_capacity)?);

        let size = order.size();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();

        Ok(Self {
            order,
            floor_db: floor_db as f64,
            rolling: vec![0.0; size],
            window: blackman_harris(size),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes_db: vec![floor_db as f64; size / 2],
            block: Vec::new(),
            queue,
            transformed: false,
        })
    }

    pub fn fft_order(&self) -> FftOrder {
        self.order
    }

    pub fn fft_size(&self) -> usize {
        self.order.size()
    }

    pub fn floor_db(&self) -> f64 {
        self.floor_db
    }

    /// Handle the renderer side polls for finished paths
    pub fn path_queue(&self) -> Arc<PathQueue> {
        Arc::clone(&self.queue)
    }

    /// Newest finished path, if one was published since the last call
    pub fn latest_path(&self) -> Option<Path> {
        self.queue.latest()
    }

    /// Magnitudes of the last transform, bin 0 up to (not including) Nyquist
    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magnitudes_db
    }

    /// Shift the rolling buffer and append `block` at the tail
    pub fn accumulate(&mut self, block: &[f32]) {
        let size = self.rolling.len();
        if block.len() >= size {
            self.rolling.copy_from_slice(&block[block.len() - size..]);
        } else {
            self.rolling.copy_within(block.len().., 0);
            self.rolling[size - block.len()..].copy_from_slice(block);
        }
    }

    /// Window and transform the rolling buffer into per-bin dB magnitudes
    pub fn transform(&mut self) {
        for ((dst, &sample), &w) in self.buffer.iter_mut().zip(&self.rolling).zip(&self.window) {
            *dst = Complex::new(sample * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Full-scale sine at a bin centre reads as the window's coherent gain
        let scale = (self.rolling.len() / 2) as f64;
        for (db, bin) in self.magnitudes_db.iter_mut().zip(&self.buffer) {
            *db = gain_to_decibels(bin.norm() as f64 / scale, self.floor_db);
        }
        self.transformed = true;
    }

    /// Map the current magnitudes onto `area`, one point per pixel column
    ///
    /// Each column covers the log-frequency span up to the next column. If
    /// that span holds whole bins, the loudest one is used; otherwise the
    /// magnitude is interpolated at the column's left-edge frequency.
    /// Spectral peaks are then placed at their sub-bin position, so a tone
    /// between two bins lands on its own column. Columns at or above Nyquist
    /// sit on the floor.
    pub fn map_to_path(&self, area: &AnalysisArea, sample_rate: f32) -> Path {
        let bin_width = sample_rate as f64 / self.rolling.len() as f64;
        let nyquist = sample_rate as f64 / 2.0;
        let last_bin = self.magnitudes_db.len() - 1;

        let mut columns: Vec<f64> = (0..area.width)
            .map(|pixel| {
                let lo_freq = area.frequency_at(pixel);
                if lo_freq >= nyquist {
                    return self.floor_db;
                }
                let lo = lo_freq / bin_width;
                let hi = area.frequency_at(pixel + 1).min(nyquist) / bin_width;

                let first = lo.ceil() as usize;
                let end = (hi.ceil() as usize).saturating_sub(1).min(last_bin);

                if (first as f64) < hi && first <= end {
                    self.magnitudes_db[first..=end]
                        .iter()
                        .copied()
                        .fold(self.floor_db, f64::max)
                } else {
                    self.interpolate(lo)
                }
            })
            .collect();

        for (bin, db) in self.refined_peaks() {
            let frequency = bin * bin_width;
            let normalized = map_from_log10(frequency, MIN_FREQUENCY as f64, MAX_FREQUENCY as f64);
            if frequency >= nyquist || !(0.0..1.0).contains(&normalized) {
                continue;
            }
            let column = ((normalized * area.width as f64) as usize).min(area.width - 1);
            columns[column] = columns[column].max(db);
        }

        columns
            .iter()
            .enumerate()
            .map(|(pixel, &db)| Point::new(area.x + pixel as f32, area.y_for_gain(db, self.floor_db, 0.0)))
            .collect()
    }

    /// Local maxima above the floor, refined with a parabola through the
    /// dB values of the peak bin and its neighbours
    ///
    /// Yields `(fractional bin, peak dB)`.
    fn refined_peaks(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.magnitudes_db.windows(3).enumerate().filter_map(move |(i, w)| {
            let (a, b, c) = (w[0], w[1], w[2]);
            if !(b > self.floor_db && b > a && b >= c) {
                return None;
            }
            // a - 2b + c < 0 because b > a and b >= c
            let offset = 0.5 * (a - c) / (a - 2.0 * b + c);
            Some((i as f64 + 1.0 + offset, b - 0.25 * (a - c) * offset))
        })
    }

    fn interpolate(&self, bin: f64) -> f64 {
        let last_bin = self.magnitudes_db.len() - 1;
        let index = bin.floor().max(0.0) as usize;
        if index >= last_bin {
            return self.magnitudes_db[last_bin];
        }
        let frac = bin - index as f64;
        self.magnitudes_db[index] * (1.0 - frac) + self.magnitudes_db[index + 1] * frac
    }

    /// Accumulate one block, transform, and publish the resulting path
    pub fn process_block(&mut self, block: &[f32], area: &AnalysisArea, sample_rate: f32) {
        self.accumulate(block);
        self.transform();
        let path = self.map_to_path(area, sample_rate);
        self.queue.publish(path);
    }

    /// Publish the current magnitudes mapped onto a new `area`
    ///
    /// Used after a resize so the trace matches the new width without
    /// waiting for more audio. Returns false if nothing has been transformed
    /// since construction or the last reset.
    pub fn republish(&mut self, area: &AnalysisArea, sample_rate: f32) -> bool {
        if !self.transformed {
            return false;
        }
        self.queue.publish(self.map_to_path(area, sample_rate));
        true
    }

    /// Pull every available block out of `fifo`, publishing a path per block
    ///
    /// Returns the number of blocks consumed.
    pub fn drain(&mut self, fifo: &mut FifoConsumer, area: &AnalysisArea, sample_rate: f32) -> usize {
        if self.block.len() != fifo.block_size() {
            self.block.resize(fifo.block_size(), 0.0);
        }

        let mut block = std::mem::take(&mut self.block);
        let mut drained = 0;
        while fifo.pop(&mut block) {
            self.process_block(&block, area, sample_rate);
            drained += 1;
        }
        self.block = block;
        drained
    }

    /// Forget all audio history and pending paths
    pub fn reset(&mut self) {
        self.rolling.fill(0.0);
        self.magnitudes_db.fill(self.floor_db);
        self.queue.clear();
        self.transformed = false;
    }
}
