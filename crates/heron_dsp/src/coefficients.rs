//! Filter Coefficient Factory
//!
//! Pure functions turning [`ChainSettings`] into biquad coefficients.
//! Based on the RBJ (Robert Bristow-Johnson) Audio EQ Cookbook; the cut
//! filters are higher-order Butterworth designs split into second-order
//! sections.
//!
//! Every function here is deterministic and allocation-free. Anything that
//! would produce a non-finite coefficient falls back to [`identity`].

use std::f64::consts::PI;

use biquad::{Coefficients, ToHertz, Type};
use rustfft::num_complex::Complex;

use crate::settings::{ChainPosition, ChainSettings, Slope};

/// Maximum number of biquad sections in one cut filter (48 dB/oct)
pub const MAX_CUT_STAGES: usize = 4;

/// Pass-through coefficients
pub fn identity() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Whether every coefficient is a finite number
pub fn is_finite(coeffs: &Coefficients<f32>) -> bool {
    [coeffs.a1, coeffs.a2, coeffs.b0, coeffs.b1, coeffs.b2]
        .iter()
        .all(|c| c.is_finite())
}

fn finite_or_identity(coeffs: Coefficients<f32>) -> Coefficients<f32> {
    if is_finite(&coeffs) {
        coeffs
    } else {
        identity()
    }
}

fn below_nyquist(frequency: f32, sample_rate: f32) -> bool {
    sample_rate.is_finite()
        && sample_rate > 0.0
        && frequency.is_finite()
        && frequency > 0.0
        && frequency < sample_rate * 0.5
}

/// Convert dB gain to linear amplitude
/// Formula: amplitude = 10^(dB/20)
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to dB, never going below `floor_db`
pub fn gain_to_decibels(gain: f64, floor_db: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(floor_db)
    } else {
        floor_db
    }
}

/// Parametric peaking EQ section
///
/// Returns identity coefficients when the centre frequency is at or above
/// Nyquist, or when Q is not positive.
pub fn make_peak_filter(settings: &ChainSettings, sample_rate: f32) -> Coefficients<f32> {
    let q = settings.peak_q;
    if !below_nyquist(settings.peak_freq, sample_rate) || !(q.is_finite() && q > 0.0) {
        return identity();
    }

    // Design in f64, the audio path runs in f32
    let a = db_to_amplitude(settings.peak_gain_db as f64).sqrt();
    let omega = 2.0 * PI * settings.peak_freq as f64 / sample_rate as f64;
    let (sin_w, cos_w) = omega.sin_cos();
    let alpha = sin_w / (2.0 * q as f64);

    let a0 = 1.0 + alpha / a;
    let coeffs = Coefficients {
        b0: ((1.0 + alpha * a) / a0) as f32,
        b1: ((-2.0 * cos_w) / a0) as f32,
        b2: ((1.0 - alpha * a) / a0) as f32,
        a1: ((-2.0 * cos_w) / a0) as f32,
        a2: ((1.0 - alpha / a) / a0) as f32,
    };
    finite_or_identity(coeffs)
}

/// Q of each second-order section of a Butterworth filter of `order`
///
/// Section k gets Q = 1 / (2 cos((2k + 1) pi / (2 order))).
pub fn butterworth_section_q(order: usize, section: usize) -> f32 {
    let angle = (2 * section + 1) as f64 * PI / (2 * order) as f64;
    (1.0 / (2.0 * angle.cos())) as f32
}

/// Biquad sections of one cut filter
///
/// Only the first `slope.stage_count()` sections are meaningful; the rest
/// stay at identity.
#[derive(Debug, Clone, Copy)]
pub struct CutCoefficients {
    pub slope: Slope,
    sections: [Coefficients<f32>; MAX_CUT_STAGES],
}

impl CutCoefficients {
    /// Sections that must be active for this slope, in processing order
    pub fn sections(&self) -> &[Coefficients<f32>] {
        &self.sections[..self.slope.stage_count()]
    }

    /// A cut filter that passes everything
    pub fn passthrough(slope: Slope) -> Self {
        Self {
            slope,
            sections: [identity(); MAX_CUT_STAGES],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CutKind {
    HighPass,
    LowPass,
}

fn make_cut_filter(kind: CutKind, frequency: f32, slope: Slope, sample_rate: f32) -> CutCoefficients {
    let mut design = CutCoefficients::passthrough(slope);
    if !below_nyquist(frequency, sample_rate) {
        return design;
    }

    let order = slope.order();
    let fs = sample_rate.hz();
    let f0 = frequency.hz();

    for (section, coeffs) in design.sections[..slope.stage_count()].iter_mut().enumerate() {
        let q = butterworth_section_q(order, section);
        let filter_type = match kind {
            CutKind::HighPass => Type::HighPass,
            CutKind::LowPass => Type::LowPass,
        };
        *coeffs = Coefficients::<f32>::from_params(filter_type, fs, f0, q)
            .map(finite_or_identity)
            .unwrap_or_else(|_| identity());
    }

    design
}

/// Low-cut: Butterworth highpass of order `2 * (slope + 1)`
pub fn make_low_cut_filter(settings: &ChainSettings, sample_rate: f32) -> CutCoefficients {
    make_cut_filter(
        CutKind::HighPass,
        settings.low_cut_freq,
        settings.low_cut_slope,
        sample_rate,
    )
}

/// High-cut: Butterworth lowpass of order `2 * (slope + 1)`
///
/// Uses the high-cut's own slope.
pub fn make_high_cut_filter(settings: &ChainSettings, sample_rate: f32) -> CutCoefficients {
    make_cut_filter(
        CutKind::LowPass,
        settings.high_cut_freq,
        settings.high_cut_slope,
        sample_rate,
    )
}

/// All coefficients for one mono chain
#[derive(Debug, Clone, Copy)]
pub struct ChainCoefficients {
    pub low_cut: CutCoefficients,
    pub peak: Coefficients<f32>,
    pub high_cut: CutCoefficients,
}

impl ChainCoefficients {
    pub fn design(settings: &ChainSettings, sample_rate: f32) -> Self {
        Self {
            low_cut: make_low_cut_filter(settings, sample_rate),
            peak: make_peak_filter(settings, sample_rate),
            high_cut: make_high_cut_filter(settings, sample_rate),
        }
    }
}

/// A complete, immutable coefficient update for both channels
///
/// This is what crosses from the control thread to the audio thread. It is
/// `Copy` and holds no heap data, so handing it over never allocates.
#[derive(Debug, Clone, Copy)]
pub struct ChainUpdate {
    pub sample_rate: f32,
    /// Sanitized settings the coefficients were designed from
    pub settings: ChainSettings,
    pub coefficients: ChainCoefficients,
    pub bypassed: [bool; 3],
}

impl ChainUpdate {
    /// Sanitize `settings` for `sample_rate` and design every stage
    pub fn from_settings(settings: &ChainSettings, sample_rate: f32) -> Self {
        let settings = settings.sanitized(sample_rate);
        Self {
            sample_rate,
            settings,
            coefficients: ChainCoefficients::design(&settings, sample_rate),
            bypassed: ChainPosition::ALL.map(|position| settings.is_bypassed(position)),
        }
    }

    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        self.bypassed[position.index()]
    }
}

/// Magnitude of one biquad's transfer function at `frequency`
///
/// Evaluates |H(e^jw)| = |b0 + b1 z^-1 + b2 z^-2| / |1 + a1 z^-1 + a2 z^-2|.
pub fn magnitude_for_frequency(coeffs: &Coefficients<f32>, frequency: f64, sample_rate: f64) -> f64 {
    let omega = 2.0 * PI * frequency / sample_rate;
    let z1 = Complex::from_polar(1.0, -omega);
    let z2 = z1 * z1;

    let numerator = Complex::new(coeffs.b0 as f64, 0.0) + z1 * coeffs.b1 as f64 + z2 * coeffs.b2 as f64;
    let denominator = Complex::new(1.0, 0.0) + z1 * coeffs.a1 as f64 + z2 * coeffs.a2 as f64;

    let den = denominator.norm();
    if den > 0.0 {
        numerator.norm() / den
    } else {
        1.0
    }
}
