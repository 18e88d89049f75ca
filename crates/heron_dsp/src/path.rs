//! Display Paths
//!
//! Polylines in display coordinates plus the log-frequency / linear-gain
//! mappings used to place them, and the bounded queue that hands finished
//! paths to whoever renders them.
//!
//! The horizontal axis is logarithmic from [`MIN_FREQUENCY`] to
//! [`MAX_FREQUENCY`]. The vertical axis is linear in dB with the larger value
//! at the top (smaller y).

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::DspError;
use crate::settings::{MAX_FREQUENCY, MAX_GAIN, MIN_FREQUENCY, MIN_GAIN};

/// Spacing of the horizontal gain grid lines (dB)
pub const GAIN_STEP: f32 = 6.0;

/// Frequencies that get a vertical grid line and a label
pub const GRID_FREQUENCIES: [f32; 13] = [
    20.0, 40.0, 60.0, 100.0, 200.0, 300.0, 500.0, 1000.0, 2000.0, 3000.0, 5000.0, 10000.0, 20000.0,
];

/// Map a normalized position in `[0, 1]` onto a logarithmic range
#[inline]
pub fn map_to_log10(normalized: f64, min: f64, max: f64) -> f64 {
    min * (max / min).powf(normalized)
}

/// Inverse of [`map_to_log10`]
#[inline]
pub fn map_from_log10(value: f64, min: f64, max: f64) -> f64 {
    (value / min).log10() / (max / min).log10()
}

/// Linear remap of `value` from `[source_min, source_max]` to
/// `[target_min, target_max]`. Not clamped.
#[inline]
pub fn jmap(value: f64, source_min: f64, source_max: f64, target_min: f64, target_max: f64) -> f64 {
    target_min + (value - source_min) * (target_max - target_min) / (source_max - source_min)
}

/// One polyline vertex
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ordered polyline, first point at the left edge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    points: Vec<Point>,
}

impl Path {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, x: f32, y: f32) {
        self.points.push(Point::new(x, y));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// Point with the smallest y, i.e. the loudest / highest point on screen
    pub fn highest_point(&self) -> Option<(usize, Point)> {
        self.points
            .iter()
            .copied()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.y.total_cmp(&b.y))
    }
}

impl FromIterator<Point> for Path {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Rectangle the curves are drawn into
///
/// `width` is an integer pixel count because every path has exactly one
/// point per pixel column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArea {
    pub x: f32,
    pub y: f32,
    pub width: usize,
    pub height: f32,
}

impl AnalysisArea {
    /// Area anchored at the origin
    pub fn new(width: usize, height: f32) -> Result<Self, DspError> {
        Self::at(0.0, 0.0, width, height)
    }

    pub fn at(x: f32, y: f32, width: usize, height: f32) -> Result<Self, DspError> {
        let area = Self { x, y, width, height };
        area.validate()?;
        Ok(area)
    }

    pub fn validate(&self) -> Result<(), DspError> {
        if self.width == 0 || !(self.height.is_finite() && self.height > 0.0) {
            return Err(DspError::InvalidDisplayArea {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width as f32
    }

    /// Frequency at the left edge of pixel column `pixel`
    #[inline]
    pub fn frequency_at(&self, pixel: usize) -> f64 {
        map_to_log10(
            pixel as f64 / self.width as f64,
            MIN_FREQUENCY as f64,
            MAX_FREQUENCY as f64,
        )
    }

    /// Horizontal position of a frequency
    pub fn x_for_frequency(&self, frequency: f64) -> f32 {
        let normalized = map_from_log10(frequency, MIN_FREQUENCY as f64, MAX_FREQUENCY as f64);
        self.x + (self.width as f64 * normalized) as f32
    }

    /// Vertical position of a gain on the `[min_db, max_db]` axis
    #[inline]
    pub fn y_for_gain(&self, gain_db: f64, min_db: f64, max_db: f64) -> f32 {
        jmap(gain_db, min_db, max_db, self.bottom() as f64, self.top() as f64) as f32
    }
}

/// Gain values that get a horizontal grid line
pub fn grid_gains() -> Vec<f32> {
    let steps = ((MAX_GAIN - MIN_GAIN) / GAIN_STEP) as usize;
    (0..=steps).map(|i| MIN_GAIN + i as f32 * GAIN_STEP).collect()
}

/// A grid line with its display position and label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLine {
    pub value: f32,
    pub position: f32,
    pub label: String,
}

/// Vertical lines at [`GRID_FREQUENCIES`], positioned on x
pub fn grid_frequencies(area: &AnalysisArea) -> Vec<GridLine> {
    GRID_FREQUENCIES
        .iter()
        .map(|&freq| GridLine {
            value: freq,
            position: area.x_for_frequency(freq as f64),
            label: frequency_label(freq),
        })
        .collect()
}

/// Horizontal lines at [`grid_gains`], positioned on y
pub fn gain_grid(area: &AnalysisArea) -> Vec<GridLine> {
    grid_gains()
        .into_iter()
        .map(|gain| GridLine {
            value: gain,
            position: area.y_for_gain(gain as f64, MIN_GAIN as f64, MAX_GAIN as f64),
            label: gain_label(gain),
        })
        .collect()
}

/// "20Hz", "500Hz", "2kHz", "20kHz"
pub fn frequency_label(freq: f32) -> String {
    if freq > 999.0 {
        format!("{}kHz", freq / 1000.0)
    } else {
        format!("{}Hz", freq)
    }
}

/// "+6", "0", "-12"
pub fn gain_label(gain: f32) -> String {
    if gain > 0.0 {
        format!("+{}", gain)
    } else {
        format!("{}", gain)
    }
}

/// Bounded hand-off of finished paths, newest wins
///
/// Producers never wait for the consumer: publishing into a full queue
/// discards the oldest entry.
pub struct PathQueue {
    paths: Mutex<VecDeque<Path>>,
    capacity: usize,
}

impl PathQueue {
    pub fn new(capacity: usize) -> Result<Self, DspError> {
        if capacity == 0 {
            return Err(DspError::InvalidQueueCapacity(capacity));
        }
        Ok(Self {
            paths: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn publish(&self, path: Path) {
        let mut paths = self.paths.lock();
        while paths.len() >= self.capacity {
            paths.pop_front();
        }
        paths.push_back(path);
    }

    /// Take the newest path and discard anything older
    pub fn latest(&self) -> Option<Path> {
        let mut paths = self.paths.lock();
        let newest = paths.pop_back();
        paths.clear();
        newest
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }

    pub fn clear(&self) {
        self.paths.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_mapping_endpoints() {
        assert!((map_to_log10(0.0, 20.0, 20000.0) - 20.0).abs() < 1e-9);
        assert!((map_to_log10(1.0, 20.0, 20000.0) - 20000.0).abs() < 1e-6);
        // 20 Hz .. 20 kHz spans three decades
        assert!((map_to_log10(1.0 / 3.0, 20.0, 20000.0) - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_log_mapping_inverse() {
        for freq in [20.0, 63.0, 1000.0, 7500.0, 20000.0] {
            let normalized = map_from_log10(freq, 20.0, 20000.0);
            assert!((map_to_log10(normalized, 20.0, 20000.0) - freq).abs() < 1e-6);
        }
    }

    #[test]
    fn test_jmap() {
        assert_eq!(jmap(0.0, -24.0, 24.0, 240.0, 0.0), 120.0);
        assert_eq!(jmap(24.0, -24.0, 24.0, 240.0, 0.0), 0.0);
        // Out-of-range input is extrapolated
        assert_eq!(jmap(48.0, -24.0, 24.0, 240.0, 0.0), -120.0);
    }

    #[test]
    fn test_area_validation() {
        assert!(AnalysisArea::new(600, 240.0).is_ok());
        assert!(AnalysisArea::new(0, 240.0).is_err());
        assert!(AnalysisArea::new(600, 0.0).is_err());
        assert!(AnalysisArea::new(600, f32::NAN).is_err());
    }

    #[test]
    fn test_area_positions() {
        let area = AnalysisArea::at(10.0, 5.0, 300, 100.0).unwrap();
        assert_eq!(area.bottom(), 105.0);
        assert_eq!(area.right(), 310.0);
        assert_eq!(area.frequency_at(0), MIN_FREQUENCY as f64);
        assert!((area.x_for_frequency(20000.0) - 310.0).abs() < 1e-3);
        assert_eq!(area.y_for_gain(0.0, -24.0, 24.0), 55.0);
    }

    #[test]
    fn test_grid_gains() {
        let gains = grid_gains();
        assert_eq!(gains.len(), 9);
        assert_eq!(gains[0], -24.0);
        assert_eq!(gains[4], 0.0);
        assert_eq!(gains[8], 24.0);
    }

    #[test]
    fn test_grid_lines() {
        let area = AnalysisArea::new(600, 240.0).unwrap();
        let freqs = grid_frequencies(&area);
        assert_eq!(freqs.len(), GRID_FREQUENCIES.len());
        assert!(freqs.windows(2).all(|w| w[0].position < w[1].position));
        assert_eq!(freqs[0].label, "20Hz");
        assert_eq!(freqs[7].label, "1kHz");
        assert_eq!(freqs[12].label, "20kHz");

        let gains = gain_grid(&area);
        assert_eq!(gains[0].label, "-24");
        assert_eq!(gains[4].label, "0");
        assert_eq!(gains[5].label, "+6");
        assert_eq!(gains[4].position, 120.0);
    }

    #[test]
    fn test_path_highest_point() {
        let path: Path = [Point::new(0.0, 50.0), Point::new(1.0, 10.0), Point::new(2.0, 30.0)]
            .into_iter()
            .collect();
        let (index, point) = path.highest_point().unwrap();
        assert_eq!(index, 1);
        assert_eq!(point.y, 10.0);
        assert!(Path::default().highest_point().is_none());
    }

    #[test]
    fn test_queue_zero_capacity_rejected() {
        assert_eq!(PathQueue::new(0).err(), Some(DspError::InvalidQueueCapacity(0)));
    }

    #[test]
    fn test_queue_latest_wins() {
        let queue = PathQueue::new(2).unwrap();
        for i in 0..5 {
            let mut path = Path::with_capacity(1);
            path.push(i as f32, 0.0);
            queue.publish(path);
        }
        assert_eq!(queue.len(), 2);

        let latest = queue.latest().unwrap();
        assert_eq!(latest.points()[0].x, 4.0);
        assert!(queue.is_empty());
        assert!(queue.latest().is_none());
    }
}
