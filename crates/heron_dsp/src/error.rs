//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while setting up DSP components
///
/// None of these are produced on the audio thread: they come from
/// constructors and `prepare()` calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    #[error("Block size must be non-zero, got {0}")]
    InvalidBlockSize(usize),

    #[error("FIFO capacity must be a non-zero power of two, got {0}")]
    InvalidFifoCapacity(usize),

    #[error("Path queue capacity must be at least 1, got {0}")]
    InvalidQueueCapacity(usize),

    #[error("Display area must be non-empty, got {width}x{height}")]
    InvalidDisplayArea { width: usize, height: f32 },

    #[error("Analyzer floor must be a finite negative dB value, got {0}")]
    InvalidFloor(f32),
}

/// Validate a sample rate handed in by the host
pub(crate) fn check_sample_rate(sample_rate: f32) -> Result<f32, DspError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(sample_rate)
    } else {
        Err(DspError::InvalidSampleRate(sample_rate))
    }
}
