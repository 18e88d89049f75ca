//! Response Curve Engine
//!
//! Produces the two overlays the renderer draws: the theoretical frequency
//! response of the current coefficients, and the newest spectral path of
//! each channel.
//!
//! The engine keeps a mirror [`FilterChain`] fed with the same
//! [`ChainUpdate`]s the audio thread receives. It only evaluates its
//! transfer function; no audio ever runs through it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chain::FilterChain;
use crate::coefficients::{gain_to_decibels, ChainUpdate};
use crate::error::{check_sample_rate, DspError};
use crate::path::{map_to_log10, AnalysisArea, Path, PathQueue, Point};
use crate::settings::{ChainSettings, MAX_FREQUENCY, MAX_GAIN, MIN_FREQUENCY, MIN_GAIN};

/// Lowest value the response curve reports (dB)
pub const RESPONSE_FLOOR_DB: f64 = -100.0;

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Overlays {
    pub response: Path,
    /// `None` while the analyzer is disabled or before its first path
    pub left: Option<Path>,
    pub right: Option<Path>,
}

pub struct ResponseCurveEngine {
    chain: FilterChain,
    sample_rate: f32,
    left: Option<Arc<PathQueue>>,
    right: Option<Arc<PathQueue>>,
    last_left: Option<Path>,
    last_right: Option<Path>,
}

impl ResponseCurveEngine {
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        Ok(Self {
            chain: FilterChain::new(),
            sample_rate: check_sample_rate(sample_rate)?,
            left: None,
            right: None,
            last_left: None,
            last_right: None,
        })
    }

    /// Connect the per-channel spectral path queues
    pub fn attach_spectra(&mut self, left: Arc<PathQueue>, right: Arc<PathQueue>) {
        self.left = Some(left);
        self.right = Some(right);
        self.last_left = None;
        self.last_right = None;
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Mirror a coefficient update that was also sent to the audio thread
    pub fn update(&mut self, update: &ChainUpdate) {
        self.sample_rate = update.sample_rate;
        self.chain.apply(update);
    }

    /// Design and mirror coefficients straight from settings
    pub fn update_settings(&mut self, settings: &ChainSettings, sample_rate: f32) -> Result<(), DspError> {
        let sample_rate = check_sample_rate(sample_rate)?;
        self.update(&ChainUpdate::from_settings(settings, sample_rate));
        Ok(())
    }

    /// Combined response of every non-bypassed position at `frequency` (dB)
    pub fn magnitude_db_at(&self, frequency: f64) -> f64 {
        let mag = self.chain.magnitude_for_frequency(frequency, self.sample_rate as f64);
        gain_to_decibels(mag, RESPONSE_FLOOR_DB)
    }

    /// Response in dB at `width` log-spaced frequencies, left edge first
    pub fn response_db(&self, width: usize) -> Vec<f64> {
        (0..width)
            .map(|i| {
                let freq = map_to_log10(
                    i as f64 / width as f64,
                    MIN_FREQUENCY as f64,
                    MAX_FREQUENCY as f64,
                );
                self.magnitude_db_at(freq)
            })
            .collect()
    }

    /// Response curve mapped onto the +/-24 dB display axis
    ///
    /// Values outside the axis are not clamped; the renderer clips.
    pub fn response_path(&self, area: &AnalysisArea) -> Path {
        self.response_db(area.width)
            .into_iter()
            .enumerate()
            .map(|(i, db)| {
                Point::new(
                    area.x + i as f32,
                    area.y_for_gain(db, MIN_GAIN as f64, MAX_GAIN as f64),
                )
            })
            .collect()
    }

    /// Build the overlays for one refresh tick
    ///
    /// Spectral paths are taken from the queues when new ones are waiting;
    /// otherwise the previous path is repeated so the trace does not flicker.
    pub fn refresh(&mut self, area: &AnalysisArea, analyzer_enabled: bool) -> Overlays {
        let response = self.response_path(area);

        if !analyzer_enabled {
            return Overlays {
                response,
                left: None,
                right: None,
            };
        }

        if let Some(path) = self.left.as_ref().and_then(|queue| queue.latest()) {
            self.last_left = Some(path);
        }
        if let Some(path) = self.right.as_ref().and_then(|queue| queue.latest()) {
            self.last_right = Some(path);
        }

        Overlays {
            response,
            left: self.last_left.clone(),
            right: self.last_right.clone(),
        }
    }

    /// Drop the cached spectral paths
    pub fn clear_spectra(&mut self) {
        self.last_left = None;
        self.last_right = None;
        if let Some(queue) = &self.left {
            queue.clear();
        }
        if let Some(queue) = &self.right {
            queue.clear();
        }
    }
}
