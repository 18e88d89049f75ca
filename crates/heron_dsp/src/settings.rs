//! Chain Settings
//!
//! Control-rate description of the three chain positions. A `ChainSettings`
//! value is read once from the parameter store and never mutated while a
//! coefficient update is being computed from it.

use serde::{Deserialize, Serialize};

/// Lowest frequency shown on the display and accepted by any filter
pub const MIN_FREQUENCY: f32 = 20.0;
/// Highest frequency shown on the display and accepted by any filter
pub const MAX_FREQUENCY: f32 = 20000.0;

/// Bottom of the response-curve gain axis (dB)
pub const MIN_GAIN: f32 = -24.0;
/// Top of the response-curve gain axis (dB)
pub const MAX_GAIN: f32 = 24.0;

/// Peak filter Q range
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 10.0;

/// Filters are never designed closer to Nyquist than this fraction
const NYQUIST_MARGIN: f32 = 0.49;

/// Cut-filter slope in dB/octave
///
/// Each step adds one second-order Butterworth section (12 dB/oct).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Zero-based slope index (0 for 12 dB/oct ... 3 for 48 dB/oct)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of cascaded biquad sections this slope needs
    pub fn stage_count(self) -> usize {
        self.index() + 1
    }

    /// Butterworth filter order (two poles per section)
    pub fn order(self) -> usize {
        2 * self.stage_count()
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.stage_count() as u32
    }

    /// Inverse of [`Slope::index`], saturating at 48 dB/oct
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Slope::Db12,
            1 => Slope::Db24,
            2 => Slope::Db36,
            _ => Slope::Db48,
        }
    }
}

/// One of the three positions in the filter cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

impl ChainPosition {
    pub const ALL: [ChainPosition; 3] = [
        ChainPosition::LowCut,
        ChainPosition::Peak,
        ChainPosition::HighCut,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Snapshot of all filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_q: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub peak_bypassed: bool,
    pub high_cut_bypassed: bool,
    pub analyzer_enabled: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self::FLAT
    }
}

impl ChainSettings {
    /// Parameter defaults: cuts fully open, peak at 750 Hz with no gain
    pub const FLAT: ChainSettings = ChainSettings {
        peak_freq: 750.0,
        peak_gain_db: 0.0,
        peak_q: 1.0,
        low_cut_freq: MIN_FREQUENCY,
        high_cut_freq: MAX_FREQUENCY,
        low_cut_slope: Slope::Db12,
        high_cut_slope: Slope::Db12,
        low_cut_bypassed: false,
        peak_bypassed: false,
        high_cut_bypassed: false,
        analyzer_enabled: true,
    };

    /// Whether the given chain position is bypassed as a whole
    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut_bypassed,
            ChainPosition::Peak => self.peak_bypassed,
            ChainPosition::HighCut => self.high_cut_bypassed,
        }
    }

    /// Clamp every field into its parameter range and below Nyquist
    ///
    /// Non-finite values fall back to the defaults in [`ChainSettings::FLAT`].
    pub fn sanitized(&self, sample_rate: f32) -> ChainSettings {
        let max_freq = if sample_rate.is_finite() && sample_rate > 0.0 {
            MAX_FREQUENCY.min(sample_rate * NYQUIST_MARGIN)
        } else {
            MAX_FREQUENCY
        };
        // Very low sample rates can push the ceiling under the floor
        let min_freq = MIN_FREQUENCY.min(max_freq);

        let freq = |value: f32, fallback: f32| finite_or(value, fallback).clamp(min_freq, max_freq);

        ChainSettings {
            peak_freq: freq(self.peak_freq, Self::FLAT.peak_freq),
            peak_gain_db: finite_or(self.peak_gain_db, 0.0).clamp(MIN_GAIN, MAX_GAIN),
            peak_q: finite_or(self.peak_q, Self::FLAT.peak_q).clamp(MIN_Q, MAX_Q),
            low_cut_freq: freq(self.low_cut_freq, Self::FLAT.low_cut_freq),
            high_cut_freq: freq(self.high_cut_freq, Self::FLAT.high_cut_freq),
            ..*self
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Read accessor onto whatever stores the parameters
///
/// Implementations must hand out a consistent snapshot of scalar fields;
/// a torn read across fields is tolerated (the next tick supersedes it).
pub trait SettingsSource {
    fn chain_settings(&self) -> ChainSettings;
}

impl SettingsSource for ChainSettings {
    fn chain_settings(&self) -> ChainSettings {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_stage_counts() {
        let counts: Vec<usize> = Slope::ALL.iter().map(|s| s.stage_count()).collect();
        assert_eq!(counts, vec![1, 2, 3, 4]);
        assert_eq!(Slope::Db48.order(), 8);
        assert_eq!(Slope::Db36.db_per_octave(), 36);
    }

    #[test]
    fn test_slope_from_index_saturates() {
        assert_eq!(Slope::from_index(1), Slope::Db24);
        assert_eq!(Slope::from_index(99), Slope::Db48);
    }

    #[test]
    fn test_default_is_flat() {
        let settings = ChainSettings::default();
        assert_eq!(settings.peak_gain_db, 0.0);
        assert_eq!(settings.low_cut_freq, MIN_FREQUENCY);
        assert_eq!(settings.high_cut_freq, MAX_FREQUENCY);
        assert!(settings.analyzer_enabled);
    }

    #[test]
    fn test_sanitize_clamps_ranges() {
        let wild = ChainSettings {
            peak_freq: 1.0,
            peak_gain_db: 100.0,
            peak_q: 0.0,
            low_cut_freq: -5.0,
            high_cut_freq: 96000.0,
            ..ChainSettings::default()
        };
        let clean = wild.sanitized(48000.0);
        assert_eq!(clean.peak_freq, MIN_FREQUENCY);
        assert_eq!(clean.peak_gain_db, MAX_GAIN);
        assert_eq!(clean.peak_q, MIN_Q);
        assert_eq!(clean.low_cut_freq, MIN_FREQUENCY);
        assert_eq!(clean.high_cut_freq, MAX_FREQUENCY);
    }

    #[test]
    fn test_sanitize_keeps_below_nyquist() {
        let settings = ChainSettings {
            high_cut_freq: 20000.0,
            ..ChainSettings::default()
        };
        let clean = settings.sanitized(22050.0);
        assert!(clean.high_cut_freq < 22050.0 / 2.0);
    }

    #[test]
    fn test_sanitize_replaces_non_finite() {
        let settings = ChainSettings {
            peak_freq: f32::NAN,
            peak_q: f32::INFINITY,
            peak_gain_db: f32::NEG_INFINITY,
            ..ChainSettings::default()
        };
        let clean = settings.sanitized(48000.0);
        assert_eq!(clean.peak_freq, ChainSettings::FLAT.peak_freq);
        assert_eq!(clean.peak_q, ChainSettings::FLAT.peak_q);
        assert_eq!(clean.peak_gain_db, 0.0);
    }

    #[test]
    fn test_settings_from_json() {
        let json = r#"{
            "peak_freq": 1000.0, "peak_gain_db": 6.0, "peak_q": 1.0,
            "low_cut_freq": 100.0, "high_cut_freq": 10000.0,
            "low_cut_slope": "Db48", "high_cut_slope": "Db12",
            "low_cut_bypassed": false, "peak_bypassed": false,
            "high_cut_bypassed": false, "analyzer_enabled": true
        }"#;
        let settings: ChainSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.low_cut_slope, Slope::Db48);
        assert_eq!(settings.high_cut_freq, 10000.0);
    }

    #[test]
    fn test_bypass_lookup() {
        let settings = ChainSettings {
            peak_bypassed: true,
            ..ChainSettings::default()
        };
        assert!(settings.is_bypassed(ChainPosition::Peak));
        assert!(!settings.is_bypassed(ChainPosition::LowCut));
        assert!(!settings.is_bypassed(ChainPosition::HighCut));
    }
}
