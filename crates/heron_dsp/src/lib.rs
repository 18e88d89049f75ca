//! Heron DSP - Parametric EQ Real-time Core
//!
//! This crate provides the signal path and analysis pipeline for Heron:
//! - Low-cut / peak / high-cut filter cascade per channel (biquad sections,
//!   12 to 48 dB/oct Butterworth cuts)
//! - Lock-free coefficient hand-off from the control thread
//! - Lock-free sample FIFOs feeding a per-channel FFT spectrum analyzer
//! - Frequency-response and spectrum paths in display coordinates
//!
//! # Architecture
//!
//! The audio path follows a strict "no allocation in audio callback" rule.
//! Coefficients are designed on the control thread and swapped in between
//! blocks. Nothing in this crate spawns threads or logs.

mod chain;
mod coefficients;
mod error;
mod fifo;
mod mailbox;
mod path;
mod presets;
mod processor;
mod response;
mod settings;
mod spectrum;

pub use chain::{CutFilter, FilterChain};
pub use coefficients::{
    butterworth_section_q, db_to_amplitude, gain_to_decibels, magnitude_for_frequency, make_high_cut_filter,
    make_low_cut_filter, make_peak_filter, ChainCoefficients, ChainUpdate, CutCoefficients, MAX_CUT_STAGES,
};
pub use error::DspError;
pub use fifo::{sample_fifo, FifoConsumer, FifoProducer, DEFAULT_FIFO_CAPACITY};
pub use mailbox::{coefficient_mailbox, CoefficientReceiver, CoefficientSender, DEFAULT_MAILBOX_CAPACITY};
pub use path::{
    frequency_label, gain_grid, gain_label, grid_frequencies, grid_gains, jmap, map_from_log10, map_to_log10,
    AnalysisArea, GridLine, Path, PathQueue, Point, GAIN_STEP, GRID_FREQUENCIES,
};
pub use presets::{find_preset, Preset, PRESETS};
pub use processor::{AnalyzerTaps, AudioProcessor, Channel, DualChannelProcessor, ProcessContext, DEFAULT_BLOCK_SIZE};
pub use response::{Overlays, ResponseCurveEngine, RESPONSE_FLOOR_DB};
pub use settings::{
    ChainPosition, ChainSettings, SettingsSource, Slope, MAX_FREQUENCY, MAX_GAIN, MAX_Q, MIN_FREQUENCY, MIN_GAIN,
    MIN_Q,
};
pub use spectrum::{FftOrder, SpectralPathGenerator, DEFAULT_FLOOR_DB};
