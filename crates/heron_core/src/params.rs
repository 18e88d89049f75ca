//! Parameter Store
//!
//! Lock-free home of the user-facing EQ parameters. Writers are the UI or
//! host automation; the control thread reads a [`ChainSettings`] snapshot
//! whenever the version counter moves.
//!
//! f32 values are stored as bit patterns in `AtomicU32` (there is no
//! `AtomicF32`). Fields are read individually, so a snapshot taken while a
//! writer is mid-way through `store()` may mix old and new fields; the bumped
//! version makes the next tick pick up the complete state.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use heron_dsp::{
    ChainSettings, SettingsSource, Slope, MAX_FREQUENCY, MAX_GAIN, MAX_Q, MIN_FREQUENCY, MIN_GAIN, MIN_Q,
};

/// Every automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutFreq,
    HighCutFreq,
    LowCutSlope,
    HighCutSlope,
    LowCutBypassed,
    PeakBypassed,
    HighCutBypassed,
    AnalyzerEnabled,
}

impl Parameter {
    pub const ALL: [Parameter; 11] = [
        Parameter::PeakFreq,
        Parameter::PeakGain,
        Parameter::PeakQuality,
        Parameter::LowCutFreq,
        Parameter::HighCutFreq,
        Parameter::LowCutSlope,
        Parameter::HighCutSlope,
        Parameter::LowCutBypassed,
        Parameter::PeakBypassed,
        Parameter::HighCutBypassed,
        Parameter::AnalyzerEnabled,
    ];

    /// Stable identifier used by hosts and saved state
    pub fn id(self) -> &'static str {
        match self {
            Parameter::PeakFreq => "Peak Freq",
            Parameter::PeakGain => "Peak Gain",
            Parameter::PeakQuality => "Peak Quality",
            Parameter::LowCutFreq => "LowCut Freq",
            Parameter::HighCutFreq => "HighCut Freq",
            Parameter::LowCutSlope => "LowCut Slope",
            Parameter::HighCutSlope => "HighCut Slope",
            Parameter::LowCutBypassed => "LowCut Bypassed",
            Parameter::PeakBypassed => "Peak Bypassed",
            Parameter::HighCutBypassed => "HighCut Bypassed",
            Parameter::AnalyzerEnabled => "Analyzer Enabled",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|param| param.id() == id)
    }

    /// Value range; slopes are indices and switches are 0 or 1
    pub fn range(self) -> (f32, f32) {
        match self {
            Parameter::PeakFreq | Parameter::LowCutFreq | Parameter::HighCutFreq => (MIN_FREQUENCY, MAX_FREQUENCY),
            Parameter::PeakGain => (MIN_GAIN, MAX_GAIN),
            Parameter::PeakQuality => (MIN_Q, MAX_Q),
            Parameter::LowCutSlope | Parameter::HighCutSlope => (0.0, (Slope::ALL.len() - 1) as f32),
            Parameter::LowCutBypassed
            | Parameter::PeakBypassed
            | Parameter::HighCutBypassed
            | Parameter::AnalyzerEnabled => (0.0, 1.0),
        }
    }

    pub fn default_value(self) -> f32 {
        value_of(&ChainSettings::FLAT, self)
    }
}

fn value_of(settings: &ChainSettings, param: Parameter) -> f32 {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    match param {
        Parameter::PeakFreq => settings.peak_freq,
        Parameter::PeakGain => settings.peak_gain_db,
        Parameter::PeakQuality => settings.peak_q,
        Parameter::LowCutFreq => settings.low_cut_freq,
        Parameter::HighCutFreq => settings.high_cut_freq,
        Parameter::LowCutSlope => settings.low_cut_slope.index() as f32,
        Parameter::HighCutSlope => settings.high_cut_slope.index() as f32,
        Parameter::LowCutBypassed => flag(settings.low_cut_bypassed),
        Parameter::PeakBypassed => flag(settings.peak_bypassed),
        Parameter::HighCutBypassed => flag(settings.high_cut_bypassed),
        Parameter::AnalyzerEnabled => flag(settings.analyzer_enabled),
    }
}

struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Shared parameter values with a change counter
pub struct SharedParameters {
    peak_freq: AtomicF32,
    peak_gain_db: AtomicF32,
    peak_q: AtomicF32,
    low_cut_freq: AtomicF32,
    high_cut_freq: AtomicF32,
    low_cut_slope: AtomicUsize,
    high_cut_slope: AtomicUsize,
    low_cut_bypassed: AtomicBool,
    peak_bypassed: AtomicBool,
    high_cut_bypassed: AtomicBool,
    /// Shared with the audio thread's analyzer taps
    analyzer_enabled: Arc<AtomicBool>,
    version: AtomicU64,
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(&ChainSettings::default())
    }
}

impl SharedParameters {
    pub fn new(settings: &ChainSettings) -> Self {
        Self {
            peak_freq: AtomicF32::new(settings.peak_freq),
            peak_gain_db: AtomicF32::new(settings.peak_gain_db),
            peak_q: AtomicF32::new(settings.peak_q),
            low_cut_freq: AtomicF32::new(settings.low_cut_freq),
            high_cut_freq: AtomicF32::new(settings.high_cut_freq),
            low_cut_slope: AtomicUsize::new(settings.low_cut_slope.index()),
            high_cut_slope: AtomicUsize::new(settings.high_cut_slope.index()),
            low_cut_bypassed: AtomicBool::new(settings.low_cut_bypassed),
            peak_bypassed: AtomicBool::new(settings.peak_bypassed),
            high_cut_bypassed: AtomicBool::new(settings.high_cut_bypassed),
            analyzer_enabled: Arc::new(AtomicBool::new(settings.analyzer_enabled)),
            version: AtomicU64::new(0),
        }
    }

    /// Bumped after every write
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Flag the audio thread checks before feeding the analyzer
    pub fn analyzer_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.analyzer_enabled)
    }

    pub fn get(&self, param: Parameter) -> f32 {
        value_of(&self.chain_settings(), param)
    }

    /// Set one parameter, clamped into its range
    ///
    /// Non-finite values are ignored.
    pub fn set(&self, param: Parameter, value: f32) {
        if !value.is_finite() {
            return;
        }
        let (min, max) = param.range();
        self.write_raw(param, value.clamp(min, max));
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Replace every parameter at once
    pub fn store(&self, settings: &ChainSettings) {
        // One version bump for the whole snapshot
        for param in Parameter::ALL {
            let value = value_of(settings, param);
            let (min, max) = param.range();
            self.write_raw(param, value.clamp(min, max));
        }
        self.version.fetch_add(1, Ordering::Release);
    }

    fn write_raw(&self, param: Parameter, value: f32) {
        let on = value >= 0.5;
        match param {
            Parameter::PeakFreq => self.peak_freq.store(value),
            Parameter::PeakGain => self.peak_gain_db.store(value),
            Parameter::PeakQuality => self.peak_q.store(value),
            Parameter::LowCutFreq => self.low_cut_freq.store(value),
            Parameter::HighCutFreq => self.high_cut_freq.store(value),
            Parameter::LowCutSlope => self.low_cut_slope.store(value.round() as usize, Ordering::Relaxed),
            Parameter::HighCutSlope => self.high_cut_slope.store(value.round() as usize, Ordering::Relaxed),
            Parameter::LowCutBypassed => self.low_cut_bypassed.store(on, Ordering::Relaxed),
            Parameter::PeakBypassed => self.peak_bypassed.store(on, Ordering::Relaxed),
            Parameter::HighCutBypassed => self.high_cut_bypassed.store(on, Ordering::Relaxed),
            Parameter::AnalyzerEnabled => self.analyzer_enabled.store(on, Ordering::Relaxed),
        }
    }
}

impl SettingsSource for SharedParameters {
    fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            peak_freq: self.peak_freq.load(),
            peak_gain_db: self.peak_gain_db.load(),
            peak_q: self.peak_q.load(),
            low_cut_freq: self.low_cut_freq.load(),
            high_cut_freq: self.high_cut_freq.load(),
            low_cut_slope: Slope::from_index(self.low_cut_slope.load(Ordering::Relaxed)),
            high_cut_slope: Slope::from_index(self.high_cut_slope.load(Ordering::Relaxed)),
            low_cut_bypassed: self.low_cut_bypassed.load(Ordering::Relaxed),
            peak_bypassed: self.peak_bypassed.load(Ordering::Relaxed),
            high_cut_bypassed: self.high_cut_bypassed.load(Ordering::Relaxed),
            analyzer_enabled: self.analyzer_enabled.load(Ordering::Relaxed),
        }
    }
}
