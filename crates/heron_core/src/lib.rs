//! Heron Core - EQ Engine
//!
//! This crate runs the Heron real-time core:
//! - Shared parameter store with host-facing parameter IDs
//! - Control thread that designs coefficients and drives the analyzer
//! - Audio callback wrapping the dual-channel filter chain
//! - JSON configuration and structured logging via `tracing`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     UI / Host Thread                        │
//! │  params ──▶ SharedParameters    EqEngine ◀──events──        │
//! └─────────────────────────────────────────────────────────────┘
//!                  │ version            │ crossbeam-channel
//!                  ▼                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Control Thread                            │
//! │   design ──rtrb──▶ AudioCallback ──FIFO──▶ FFT ──▶ paths    │
//! └─────────────────────────────────────────────────────────────┘
//!                        │
//!              (Zero allocation in the audio callback)
//! ```

mod config;
mod engine;
mod error;
mod message;
mod params;

pub use config::{AnalyzerConfig, DisplayConfig, EngineConfig, StreamConfig};
pub use engine::{AudioCallback, EqEngine};
pub use error::{EngineError, EngineResult};
pub use message::{Command, Event};
pub use params::{Parameter, SharedParameters};

// Re-export DSP types for convenience
pub use heron_dsp::{
    AnalysisArea, AudioProcessor, ChainSettings, FftOrder, Overlays, Path, Point, ProcessContext, SettingsSource,
    Slope, PRESETS,
};
