//! Audio Processor
//!
//! [`AudioProcessor`] is the interface the audio callback drives, and
//! [`DualChannelProcessor`] is the stereo EQ behind it: two independent
//! [`FilterChain`]s plus optional post-filter taps into the analyzer FIFOs.
//!
//! # Real-time Safety
//!
//! `process_*` never allocates, locks or logs. Coefficient updates arrive
//! through a [`CoefficientReceiver`] and are applied at the start of a
//! block, so every sample of a block sees the same coefficients.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chain::FilterChain;
use crate::coefficients::ChainUpdate;
use crate::error::{check_sample_rate, DspError};
use crate::fifo::FifoProducer;
use crate::mailbox::CoefficientReceiver;
use crate::settings::ChainSettings;

/// Block size assumed until the host calls `prepare`
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Context passed to processors containing stream metadata
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
    pub buffer_size: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_size,
        }
    }
}

/// Trait for the processor the audio callback drives
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
/// - Constant or O(n) time complexity where n = buffer size
pub trait AudioProcessor: Send {
    /// Process audio buffer in-place
    ///
    /// Buffer format is interleaved: [L0, R0, L1, R1, ...]
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Reset internal state (delay lines, partial analyzer blocks)
    fn reset(&mut self);

    /// Human-readable name for debugging/UI
    fn name(&self) -> &'static str;

    /// Whether this processor currently changes the signal
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Audio-thread ends of the two analyzer FIFOs
pub struct AnalyzerTaps {
    left: FifoProducer,
    right: FifoProducer,
    enabled: Arc<AtomicBool>,
    /// Switch state seen on the previous block
    was_enabled: bool,
}

impl AnalyzerTaps {
    /// `enabled` is shared with the control side; while it is false no
    /// samples are written and no FFT work is queued.
    pub fn new(left: FifoProducer, right: FifoProducer, enabled: Arc<AtomicBool>) -> Self {
        let was_enabled = enabled.load(Ordering::Relaxed);
        Self {
            left,
            right,
            enabled,
            was_enabled,
        }
    }

    /// Read the switch for this block
    ///
    /// A tap coming back on drops the partial block it was assembling when
    /// it was switched off, so no FIFO block mixes old and new audio.
    #[inline]
    fn poll_enabled(&mut self) -> bool {
        let enabled = self.enabled.load(Ordering::Relaxed);
        if enabled && !self.was_enabled {
            self.clear_pending();
        }
        self.was_enabled = enabled;
        enabled
    }

    #[inline]
    fn write(&mut self, left: &[f32], right: &[f32]) {
        self.left.write_samples(left);
        self.right.write_samples(right);
    }

    fn clear_pending(&mut self) {
        self.left.clear_pending();
        self.right.clear_pending();
    }
}

/// Stereo parametric EQ: low-cut, peak and high-cut on each channel
pub struct DualChannelProcessor {
    left: FilterChain,
    right: FilterChain,
    sample_rate: f32,
    block_size: usize,
    /// Settings behind the coefficients currently loaded
    settings: ChainSettings,
    updates: Option<CoefficientReceiver>,
    taps: Option<AnalyzerTaps>,
    /// Deinterleaved post-filter samples for the analyzer taps
    tap_left: Vec<f32>,
    tap_right: Vec<f32>,
}

impl DualChannelProcessor {
    /// Create a processor with flat settings
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        let sample_rate = check_sample_rate(sample_rate)?;
        let mut processor = Self {
            left: FilterChain::new(),
            right: FilterChain::new(),
            sample_rate,
            block_size: DEFAULT_BLOCK_SIZE,
            settings: ChainSettings::default(),
            updates: None,
            taps: None,
            tap_left: vec![0.0; DEFAULT_BLOCK_SIZE],
            tap_right: vec![0.0; DEFAULT_BLOCK_SIZE],
        };
        processor.update(&ChainSettings::default());
        Ok(processor)
    }

    /// Host lifecycle: new stream format
    ///
    /// Redesigns the coefficients for the new sample rate from the last
    /// settings seen and clears all filter state. Allocates; not for the
    /// audio callback.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) -> Result<(), DspError> {
        let sample_rate = check_sample_rate(sample_rate)?;
        if block_size == 0 {
            return Err(DspError::InvalidBlockSize(block_size));
        }

        self.sample_rate = sample_rate;
        self.block_size = block_size;
        self.tap_left.resize(block_size, 0.0);
        self.tap_right.resize(block_size, 0.0);

        let settings = self.settings;
        self.update(&settings);
        self.reset();
        Ok(())
    }

    /// Clear delay lines and any partially assembled analyzer block
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        if let Some(taps) = &mut self.taps {
            taps.clear_pending();
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Design coefficients from `settings` and load them on both channels
    ///
    /// For single-threaded use. With a mailbox attached, the control thread
    /// designs updates and the audio thread picks them up instead.
    pub fn update(&mut self, settings: &ChainSettings) {
        let update = ChainUpdate::from_settings(settings, self.sample_rate);
        self.apply(&update);
    }

    /// Load a precomputed update on both channels
    #[inline]
    pub fn apply(&mut self, update: &ChainUpdate) {
        self.settings = update.settings;
        self.left.apply(update);
        self.right.apply(update);
    }

    pub fn attach_mailbox(&mut self, updates: CoefficientReceiver) {
        self.updates = Some(updates);
    }

    pub fn attach_analyzer(&mut self, taps: AnalyzerTaps) {
        self.taps = Some(taps);
    }

    pub fn chain(&self, channel: Channel) -> &FilterChain {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    /// Apply the newest pending update, if any
    ///
    /// Updates designed for another sample rate are stale (the stream was
    /// re-prepared after they were sent) and are ignored.
    #[inline]
    fn poll_updates(&mut self) {
        let latest = self.updates.as_mut().and_then(|updates| updates.latest());
        if let Some(update) = latest {
            if update.sample_rate == self.sample_rate {
                self.apply(&update);
            }
        }
    }

    /// Process separate left/right buffers in place
    #[inline]
    pub fn process_planar(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.poll_updates();

        self.left.process_block(left);
        self.right.process_block(right);

        if let Some(taps) = &mut self.taps {
            if taps.poll_enabled() {
                taps.write(left, right);
            }
        }
    }

    /// Process an interleaved buffer in place
    ///
    /// Channel 0 runs through the left chain and channel 1 through the right
    /// chain. Mono input feeds both analyzer taps from channel 0; channels
    /// beyond the second pass through untouched.
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        self.poll_updates();

        let tapping = self.taps.as_mut().is_some_and(AnalyzerTaps::poll_enabled);
        let chunk_frames = self.tap_left.len();

        for chunk in buffer.chunks_mut(chunk_frames * channels) {
            let mut frames = 0;
            for (i, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                frame[0] = self.left.process_sample(frame[0]);
                let right = if channels > 1 {
                    frame[1] = self.right.process_sample(frame[1]);
                    frame[1]
                } else {
                    frame[0]
                };
                self.tap_left[i] = frame[0];
                self.tap_right[i] = right;
                frames = i + 1;
            }

            if tapping {
                if let Some(taps) = &mut self.taps {
                    taps.write(&self.tap_left[..frames], &self.tap_right[..frames]);
                }
            }
        }
    }
}

impl AudioProcessor for DualChannelProcessor {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        self.process_interleaved(buffer, context.channels);
    }

    fn reset(&mut self) {
        DualChannelProcessor::reset(self);
    }

    fn name(&self) -> &'static str {
        "Parametric EQ"
    }

    fn is_enabled(&self) -> bool {
        !(self.settings.low_cut_bypassed && self.settings.peak_bypassed && self.settings.high_cut_bypassed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::sample_fifo;
    use crate::mailbox::coefficient_mailbox;
    use crate::settings::{ChainPosition, Slope};

    fn boosted() -> ChainSettings {
        ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 12.0,
            low_cut_freq: 80.0,
            low_cut_slope: Slope::Db36,
            ..ChainSettings::default()
        }
    }

    fn stereo_signal(frames: usize) -> Vec<f32> {
        (0..frames * 2)
            .map(|i| ((i / 2) as f32 * 0.13).sin() * if i % 2 == 0 { 0.5 } else { -0.3 })
            .collect()
    }

    #[test]
    fn test_invalid_lifecycle_arguments() {
        assert!(DualChannelProcessor::new(0.0).is_err());
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        assert_eq!(processor.prepare(44100.0, 0), Err(DspError::InvalidBlockSize(0)));
        assert!(processor.prepare(f32::NAN, 256).is_err());
        assert_eq!(processor.sample_rate(), 48000.0);
    }

    #[test]
    fn test_update_reaches_both_channels() {
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.update(&boosted());

        for channel in [Channel::Left, Channel::Right] {
            let chain = processor.chain(channel);
            assert_eq!(chain.low_cut().active_stages(), 3);
            let mag = chain.magnitude_for_frequency(1000.0, 48000.0);
            assert!(mag > 3.5, "{channel:?}: {mag}");
        }
    }

    #[test]
    fn test_channels_are_independent() {
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.update(&boosted());

        let mut left = vec![0.0f32; 256];
        left[0] = 1.0;
        let mut right = vec![0.0f32; 256];
        processor.process_planar(&mut left, &mut right);

        assert!(left.iter().any(|&s| s != 0.0));
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_interleaved_matches_planar() {
        let mut planar = DualChannelProcessor::new(48000.0).unwrap();
        let mut interleaved = DualChannelProcessor::new(48000.0).unwrap();
        planar.update(&boosted());
        interleaved.update(&boosted());

        let input = stereo_signal(1500);
        let mut left: Vec<f32> = input.iter().step_by(2).copied().collect();
        let mut right: Vec<f32> = input.iter().skip(1).step_by(2).copied().collect();
        planar.process_planar(&mut left, &mut right);

        let mut buffer = input.clone();
        interleaved.process_interleaved(&mut buffer, 2);

        for i in 0..1500 {
            assert_eq!(buffer[2 * i], left[i]);
            assert_eq!(buffer[2 * i + 1], right[i]);
        }
    }

    #[test]
    fn test_bypassed_processor_is_identity() {
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.update(&ChainSettings {
            low_cut_bypassed: true,
            peak_bypassed: true,
            high_cut_bypassed: true,
            ..boosted()
        });
        assert!(!AudioProcessor::is_enabled(&processor));

        let input = stereo_signal(512);
        let mut buffer = input.clone();
        let context = ProcessContext::new(48000.0, 2, 512);
        processor.process(&mut buffer, &context);
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_mailbox_update_applied_at_block_start() {
        let (mut sender, receiver) = coefficient_mailbox(4);
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.attach_mailbox(receiver);

        sender.send(ChainUpdate::from_settings(&boosted(), 48000.0));
        assert_eq!(processor.chain(Channel::Left).low_cut().active_stages(), 1);

        let mut buffer = stereo_signal(64);
        processor.process_interleaved(&mut buffer, 2);
        assert_eq!(processor.chain(Channel::Left).low_cut().active_stages(), 3);
        assert_eq!(processor.settings().peak_gain_db, 12.0);
    }

    #[test]
    fn test_stale_sample_rate_update_ignored() {
        let (mut sender, receiver) = coefficient_mailbox(4);
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.attach_mailbox(receiver);

        sender.send(ChainUpdate::from_settings(&boosted(), 44100.0));
        let mut left = vec![0.0; 32];
        let mut right = vec![0.0; 32];
        processor.process_planar(&mut left, &mut right);

        assert_eq!(processor.settings().peak_gain_db, 0.0);
    }

    #[test]
    fn test_prepare_redesigns_for_new_rate() {
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.update(&boosted());
        processor.prepare(96000.0, 128).unwrap();

        assert_eq!(processor.sample_rate(), 96000.0);
        assert_eq!(processor.block_size(), 128);
        let mag = processor
            .chain(Channel::Right)
            .magnitude_for_frequency(1000.0, 96000.0);
        assert!(mag > 3.5);
    }

    #[test]
    fn test_analyzer_taps_follow_toggle() {
        let (left_tx, mut left_rx) = sample_fifo(8, 64).unwrap();
        let (right_tx, mut right_rx) = sample_fifo(8, 64).unwrap();
        let enabled = Arc::new(AtomicBool::new(true));

        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.update(&ChainSettings {
            peak_bypassed: true,
            ..ChainSettings::default()
        });
        processor.attach_analyzer(AnalyzerTaps::new(left_tx, right_tx, Arc::clone(&enabled)));
        assert!(processor.chain(Channel::Left).is_bypassed(ChainPosition::Peak));

        let mut buffer = stereo_signal(128);
        processor.process_interleaved(&mut buffer, 2);
        assert_eq!(left_rx.available_blocks(), 2);
        assert_eq!(right_rx.available_blocks(), 2);

        // Taps carry the post-filter signal
        let mut block = vec![0.0; 64];
        assert!(left_rx.pop(&mut block));
        assert_eq!(block[10], buffer[20]);
        assert!(right_rx.pop(&mut block));
        assert_eq!(block[10], buffer[21]);

        enabled.store(false, Ordering::Relaxed);
        let mut buffer = stereo_signal(128);
        processor.process_interleaved(&mut buffer, 2);
        assert_eq!(left_rx.available_blocks(), 1);
    }

    #[test]
    fn test_reenabled_tap_starts_a_fresh_block() {
        let (left_tx, mut left_rx) = sample_fifo(8, 64).unwrap();
        let (right_tx, _right_rx) = sample_fifo(8, 64).unwrap();
        let enabled = Arc::new(AtomicBool::new(true));
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.attach_analyzer(AnalyzerTaps::new(left_tx, right_tx, Arc::clone(&enabled)));

        // One full block plus 36 frames left pending
        let mut buffer = stereo_signal(100);
        processor.process_interleaved(&mut buffer, 2);
        assert_eq!(left_rx.available_blocks(), 1);

        enabled.store(false, Ordering::Relaxed);
        let mut buffer = stereo_signal(64);
        processor.process_interleaved(&mut buffer, 2);

        enabled.store(true, Ordering::Relaxed);
        let mut fresh = stereo_signal(64);
        processor.process_interleaved(&mut fresh, 2);
        assert_eq!(left_rx.available_blocks(), 2);

        let mut block = vec![0.0; 64];
        assert!(left_rx.pop(&mut block));
        assert!(left_rx.pop(&mut block));
        let expected: Vec<f32> = fresh.iter().step_by(2).copied().collect();
        assert_eq!(block, expected);
    }

    #[test]
    fn test_mono_interleaved_feeds_both_taps() {
        let (left_tx, mut left_rx) = sample_fifo(4, 32).unwrap();
        let (right_tx, mut right_rx) = sample_fifo(4, 32).unwrap();
        let mut processor = DualChannelProcessor::new(48000.0).unwrap();
        processor.attach_analyzer(AnalyzerTaps::new(
            left_tx,
            right_tx,
            Arc::new(AtomicBool::new(true)),
        ));

        let mut buffer: Vec<f32> = (0..32).map(|i| i as f32 * 0.01).collect();
        processor.process_interleaved(&mut buffer, 1);

        let mut left = vec![0.0; 32];
        let mut right = vec![0.0; 32];
        assert!(left_rx.pop(&mut left));
        assert!(right_rx.pop(&mut right));
        assert_eq!(left, right);
    }
}
