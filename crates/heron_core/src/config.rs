//! Engine and Stream Configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use heron_dsp::{AnalysisArea, DspError, FftOrder, DEFAULT_FIFO_CAPACITY, DEFAULT_FLOOR_DB, DEFAULT_MAILBOX_CAPACITY};

/// Audio stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Host block size in frames
    pub block_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            block_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds for this configuration
    pub fn latency_ms(&self) -> f32 {
        (self.block_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.block_size < 16 || self.block_size > 8192 {
            return Err(format!("Invalid block size: {}", self.block_size));
        }
        Ok(())
    }
}

/// Spectrum analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub fft_order: FftOrder,

    /// Blocks per channel FIFO (power of two)
    pub fifo_capacity: usize,

    /// Samples per FIFO block
    pub fifo_block_size: usize,

    /// Bottom of the spectrum display (dB)
    pub floor_db: f32,

    /// Finished spectral paths kept per channel
    pub path_queue_capacity: usize,

    /// Overlay refresh rate of the control thread
    pub refresh_hz: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_order: FftOrder::Order2048,
            fifo_capacity: DEFAULT_FIFO_CAPACITY,
            fifo_block_size: 512,
            floor_db: DEFAULT_FLOOR_DB,
            path_queue_capacity: 2,
            refresh_hz: 60,
        }
    }
}

impl AnalyzerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fifo_capacity == 0 || !self.fifo_capacity.is_power_of_two() {
            return Err(format!("FIFO capacity must be a power of two: {}", self.fifo_capacity));
        }
        if self.fifo_block_size == 0 || self.fifo_block_size > self.fft_order.size() {
            return Err(format!(
                "FIFO block size must be between 1 and the FFT size ({}): {}",
                self.fft_order.size(),
                self.fifo_block_size
            ));
        }
        if !(self.floor_db.is_finite() && self.floor_db < 0.0) {
            return Err(format!("Invalid analyzer floor: {} dB", self.floor_db));
        }
        if self.path_queue_capacity == 0 {
            return Err("Path queue capacity must be at least 1".into());
        }
        if self.refresh_hz == 0 || self.refresh_hz > 240 {
            return Err(format!("Invalid refresh rate: {} Hz", self.refresh_hz));
        }
        Ok(())
    }
}

/// Size of the area the overlays are drawn into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Width in pixels; every path has one point per pixel
    pub width: usize,
    pub height: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 240.0,
        }
    }
}

impl DisplayConfig {
    pub fn area(&self) -> Result<AnalysisArea, DspError> {
        AnalysisArea::new(self.width, self.height)
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub stream: StreamConfig,
    pub analyzer: AnalyzerConfig,
    pub display: DisplayConfig,

    /// Coefficient updates that can be in flight to the audio thread
    pub mailbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            analyzer: AnalyzerConfig::default(),
            display: DisplayConfig::default(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                block_size: 128, // ~2.6ms latency
            },
            analyzer: AnalyzerConfig {
                fifo_capacity: 64,
                fifo_block_size: 256,
                ..AnalyzerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Create config with a finer spectrum and a wider display
    pub fn high_resolution() -> Self {
        Self {
            analyzer: AnalyzerConfig {
                fft_order: FftOrder::Order8192,
                fifo_block_size: 1024,
                ..AnalyzerConfig::default()
            },
            display: DisplayConfig {
                width: 1200,
                height: 480.0,
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.stream.validate()?;
        self.analyzer.validate()?;
        self.display.area().map_err(|e| e.to_string())?;
        if self.mailbox_capacity == 0 {
            return Err("Mailbox capacity must be at least 1".into());
        }
        Ok(())
    }

    /// Load and validate a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate().map_err(EngineError::ConfigError)?;
        Ok(config)
    }
}
