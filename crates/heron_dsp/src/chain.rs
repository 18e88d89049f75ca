//! Filter Chain
//!
//! Runtime cascade for one channel: low-cut (up to 4 sections), peak
//! (1 section), high-cut (up to 4 sections), processed in that order.
//!
//! Coefficients are only replaced through `&mut self`, which on the audio
//! side happens between blocks, so a block never sees a mix of old and new
//! coefficients.

use biquad::{Biquad, Coefficients, DirectForm2Transposed};

use crate::coefficients::{identity, magnitude_for_frequency, ChainUpdate, CutCoefficients, MAX_CUT_STAGES};
use crate::settings::{ChainPosition, Slope};

/// One biquad section with its active coefficients
#[derive(Clone)]
struct Stage {
    // DirectForm2Transposed: better numerical stability than DF1
    filter: DirectForm2Transposed<f32>,
    coefficients: Coefficients<f32>,
    active: bool,
}

impl Stage {
    fn new() -> Self {
        Self {
            filter: DirectForm2Transposed::<f32>::new(identity()),
            coefficients: identity(),
            active: false,
        }
    }

    /// Swap in new coefficients and enable the stage
    ///
    /// The delay line is kept when `was_active`, so a running stage picks
    /// up the new response without a transient. A stage coming back from
    /// bypass starts from a clean delay line.
    fn load(&mut self, coefficients: Coefficients<f32>, was_active: bool) {
        if !was_active {
            self.filter.reset_state();
        }
        self.coefficients = coefficients;
        self.filter.update_coefficients(coefficients);
        self.active = true;
    }

    #[inline]
    fn run(&mut self, sample: f32) -> f32 {
        self.filter.run(sample)
    }

    fn magnitude(&self, frequency: f64, sample_rate: f64) -> f64 {
        magnitude_for_frequency(&self.coefficients, frequency, sample_rate)
    }

    fn reset(&mut self) {
        self.filter.reset_state();
    }
}

/// Cascade of up to four Butterworth sections
///
/// Active stages are always a prefix: stage k only runs if stages 0..k do.
/// The only way to change which stages are active is [`CutFilter::configure`].
#[derive(Clone)]
pub struct CutFilter {
    stages: [Stage; MAX_CUT_STAGES],
}

impl Default for CutFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CutFilter {
    /// A cut filter with every stage bypassed
    pub fn new() -> Self {
        Self {
            stages: core::array::from_fn(|_| Stage::new()),
        }
    }

    /// Reconfigure for a new design
    ///
    /// Bypasses all four stages first, then re-enables stages `0..=slope`
    /// one by one, each with its fresh coefficients. Lowering the slope can
    /// therefore never leave a higher stage running on stale coefficients.
    pub fn configure(&mut self, design: &CutCoefficients) {
        let previously_active = self.active_stages();
        for stage in self.stages.iter_mut() {
            stage.active = false;
        }

        for (index, (stage, coefficients)) in self.stages.iter_mut().zip(design.sections()).enumerate() {
            stage.load(*coefficients, index < previously_active);
        }
    }

    /// Number of non-bypassed stages
    pub fn active_stages(&self) -> usize {
        self.stages.iter().take_while(|s| s.active).count()
    }

    pub fn is_stage_active(&self, index: usize) -> bool {
        self.stages.get(index).map_or(false, |s| s.active)
    }

    /// Slope currently realised by the active stages, if any are active
    pub fn slope(&self) -> Option<Slope> {
        match self.active_stages() {
            0 => None,
            n => Some(Slope::from_index(n - 1)),
        }
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut out = sample;
        for stage in self.stages.iter_mut().take_while(|s| s.active) {
            out = stage.run(out);
        }
        out
    }

    /// Product of the active stages' magnitudes at `frequency`
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        self.stages
            .iter()
            .take_while(|s| s.active)
            .map(|s| s.magnitude(frequency, sample_rate))
            .product()
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }
}

/// Complete mono chain: low-cut -> peak -> high-cut
#[derive(Clone)]
pub struct FilterChain {
    low_cut: CutFilter,
    peak: Stage,
    high_cut: CutFilter,
    bypassed: [bool; 3],
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterChain {
    /// A chain that passes audio through untouched
    pub fn new() -> Self {
        let mut peak = Stage::new();
        peak.load(identity(), false);
        Self {
            low_cut: CutFilter::new(),
            peak,
            high_cut: CutFilter::new(),
            bypassed: [false; 3],
        }
    }

    /// Apply a full coefficient update: peak, both cut filters and the
    /// per-position bypass flags
    pub fn apply(&mut self, update: &ChainUpdate) {
        for position in ChainPosition::ALL {
            self.set_bypassed(position, update.is_bypassed(position));
        }
        self.set_peak_coefficients(update.coefficients.peak);
        self.low_cut.configure(&update.coefficients.low_cut);
        self.high_cut.configure(&update.coefficients.high_cut);
    }

    pub fn set_peak_coefficients(&mut self, coefficients: Coefficients<f32>) {
        let was_active = self.peak.active;
        self.peak.load(coefficients, was_active);
    }

    /// Run the cut-filter reconfiguration protocol on the low-cut
    pub fn configure_low_cut(&mut self, design: &CutCoefficients) {
        self.low_cut.configure(design);
    }

    /// Run the cut-filter reconfiguration protocol on the high-cut
    pub fn configure_high_cut(&mut self, design: &CutCoefficients) {
        self.high_cut.configure(design);
    }

    /// Bypass a whole chain position (identity, zero latency)
    pub fn set_bypassed(&mut self, position: ChainPosition, bypassed: bool) {
        self.bypassed[position.index()] = bypassed;
    }

    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        self.bypassed[position.index()]
    }

    pub fn low_cut(&self) -> &CutFilter {
        &self.low_cut
    }

    pub fn high_cut(&self) -> &CutFilter {
        &self.high_cut
    }

    /// Process one sample through every non-bypassed position
    ///
    /// # Real-time Safety
    /// No allocations, no locks. Cost is bounded by the number of active stages.
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut out = sample;
        if !self.bypassed[ChainPosition::LowCut.index()] {
            out = self.low_cut.process_sample(out);
        }
        if !self.bypassed[ChainPosition::Peak.index()] {
            out = self.peak.run(out);
        }
        if !self.bypassed[ChainPosition::HighCut.index()] {
            out = self.high_cut.process_sample(out);
        }
        out
    }

    /// Process a mono buffer in place
    #[inline]
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Combined magnitude of all non-bypassed positions at `frequency`
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        let mut mag = 1.0;
        if !self.is_bypassed(ChainPosition::LowCut) {
            mag *= self.low_cut.magnitude_for_frequency(frequency, sample_rate);
        }
        if !self.is_bypassed(ChainPosition::Peak) {
            mag *= self.peak.magnitude(frequency, sample_rate);
        }
        if !self.is_bypassed(ChainPosition::HighCut) {
            mag *= self.high_cut.magnitude_for_frequency(frequency, sample_rate);
        }
        mag
    }

    /// Clear all delay lines
    ///
    /// Call when switching audio sources to prevent filter ringing
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::{make_low_cut_filter, ChainUpdate};
    use crate::settings::ChainSettings;

    fn low_cut_design(slope: Slope) -> CutCoefficients {
        let settings = ChainSettings {
            low_cut_freq: 200.0,
            low_cut_slope: slope,
            ..ChainSettings::default()
        };
        make_low_cut_filter(&settings, 48000.0)
    }

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i as f32) * 0.37).sin() * 0.8).collect()
    }

    #[test]
    fn test_configure_activates_prefix() {
        let mut cut = CutFilter::new();
        cut.configure(&low_cut_design(Slope::Db24));

        assert!(cut.is_stage_active(0));
        assert!(cut.is_stage_active(1));
        assert!(!cut.is_stage_active(2));
        assert!(!cut.is_stage_active(3));
        assert_eq!(cut.active_stages(), 2);
    }

    #[test]
    fn test_reducing_slope_disables_upper_stages() {
        let mut cut = CutFilter::new();
        cut.configure(&low_cut_design(Slope::Db48));
        assert_eq!(cut.active_stages(), 4);

        // 24 dB/oct must leave exactly stages 0 and 1 regardless of prior state
        cut.configure(&low_cut_design(Slope::Db24));
        assert_eq!(cut.active_stages(), 2);
        assert!(!cut.is_stage_active(2));
        assert!(!cut.is_stage_active(3));
        assert_eq!(cut.slope(), Some(Slope::Db24));
    }

    #[test]
    fn test_every_slope_sets_stage_count() {
        let mut cut = CutFilter::new();
        for slope in [Slope::Db48, Slope::Db12, Slope::Db36, Slope::Db24, Slope::Db12] {
            cut.configure(&low_cut_design(slope));
            assert_eq!(cut.active_stages(), slope.stage_count());
            for k in 0..MAX_CUT_STAGES {
                assert_eq!(cut.is_stage_active(k), k < slope.stage_count());
            }
        }
    }

    #[test]
    fn test_new_cut_filter_is_fully_bypassed() {
        let cut = CutFilter::new();
        assert_eq!(cut.active_stages(), 0);
        assert_eq!(cut.slope(), None);
        assert!(!cut.is_stage_active(7));
    }

    #[test]
    fn test_all_positions_bypassed_is_identity() {
        let settings = ChainSettings {
            peak_gain_db: 12.0,
            low_cut_freq: 500.0,
            low_cut_slope: Slope::Db48,
            high_cut_freq: 2000.0,
            high_cut_slope: Slope::Db48,
            low_cut_bypassed: true,
            peak_bypassed: true,
            high_cut_bypassed: true,
            ..ChainSettings::default()
        };
        let mut chain = FilterChain::new();
        chain.apply(&ChainUpdate::from_settings(&settings, 48000.0));

        let input = test_signal(1024);
        let mut output = input.clone();
        chain.process_block(&mut output);
        assert_eq!(input, output);
    }

    #[test]
    fn test_fresh_chain_is_identity() {
        let mut chain = FilterChain::new();
        let input = test_signal(256);
        let mut output = input.clone();
        chain.process_block(&mut output);
        assert_eq!(input, output);
    }

    #[test]
    fn test_low_cut_attenuates_low_tone() {
        let mut chain = FilterChain::new();
        let settings = ChainSettings {
            low_cut_freq: 1000.0,
            low_cut_slope: Slope::Db48,
            ..ChainSettings::default()
        };
        chain.apply(&ChainUpdate::from_settings(&settings, 48000.0));

        let sample_rate = 48000.0;
        let mut max_output = 0.0_f32;
        for i in 0..48000 {
            let t = i as f32 / sample_rate;
            let sample = (2.0 * std::f32::consts::PI * 50.0 * t).sin();
            let out = chain.process_sample(sample);
            // Skip the initial transient
            if i > 24000 {
                max_output = max_output.max(out.abs());
            }
        }
        assert!(max_output < 0.001, "50 Hz leaked through: {}", max_output);
    }

    #[test]
    fn test_magnitude_matches_bypass_state() {
        let mut chain = FilterChain::new();
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            ..ChainSettings::default()
        };
        chain.apply(&ChainUpdate::from_settings(&settings, 48000.0));
        let boosted = chain.magnitude_for_frequency(1000.0, 48000.0);
        assert!(boosted > 1.9 && boosted < 2.1);

        chain.set_bypassed(ChainPosition::Peak, true);
        let flat = chain.magnitude_for_frequency(1000.0, 48000.0);
        assert!((flat - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_reset_keeps_configuration() {
        let mut chain = FilterChain::new();
        chain.configure_low_cut(&low_cut_design(Slope::Db36));
        let mut buffer = test_signal(128);
        chain.process_block(&mut buffer);

        chain.reset();
        assert_eq!(chain.low_cut().active_stages(), 3);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    fn tone(i: usize) -> f32 {
        (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin() * 0.5
    }

    #[test]
    fn test_reapplying_update_keeps_output_continuous() {
        let settings = ChainSettings {
            low_cut_freq: 100.0,
            low_cut_slope: Slope::Db48,
            peak_freq: 1000.0,
            peak_gain_db: 3.0,
            ..ChainSettings::default()
        };
        let mut steady = FilterChain::new();
        let mut retuned = FilterChain::new();
        steady.apply(&ChainUpdate::from_settings(&settings, 48000.0));
        retuned.apply(&ChainUpdate::from_settings(&settings, 48000.0));

        for i in 0..24000 {
            steady.process_sample(tone(i));
            retuned.process_sample(tone(i));
        }

        let nudged = ChainSettings {
            peak_gain_db: 3.0001,
            ..settings
        };
        retuned.apply(&ChainUpdate::from_settings(&nudged, 48000.0));

        let max_deviation = (24000..24100)
            .map(|i| (steady.process_sample(tone(i)) - retuned.process_sample(tone(i))).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_deviation < 1e-3, "update caused a jump of {}", max_deviation);
    }

    #[test]
    fn test_raised_slope_starts_new_stages_clean() {
        let mut cut = CutFilter::new();
        cut.configure(&low_cut_design(Slope::Db12));
        for i in 0..4800 {
            cut.process_sample(tone(i));
        }

        // Stages 1..4 are fresh; stage 0 keeps running
        cut.configure(&low_cut_design(Slope::Db48));
        assert_eq!(cut.active_stages(), 4);
        let out: Vec<f32> = (4800..4900).map(|i| cut.process_sample(tone(i))).collect();
        assert!(out.iter().all(|s| s.is_finite() && s.abs() < 1.0));
    }
}
