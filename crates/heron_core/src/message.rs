//! Message Types for Thread Communication
//!
//! Commands flow from the engine handle -> control thread
//! Events flow from the control thread -> engine handle

use serde::{Deserialize, Serialize};

use heron_dsp::Overlays;

/// Commands sent to the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Resize the analysis area the overlays are drawn into
    Resize { width: usize, height: f32 },

    /// Ask for the current overlays (answered with `Event::Overlays`)
    RequestOverlays,

    /// Shutdown the engine
    Shutdown,
}

/// Events sent from the control thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// The audio side was prepared for a new stream format
    Prepared { sample_rate: f32, block_size: usize },

    /// New coefficients were sent to the audio thread
    CoefficientsUpdated { version: u64 },

    /// Fresh overlays are available through `latest_overlays()`
    OverlaysUpdated { frame: u64 },

    /// Snapshot answering `Command::RequestOverlays`
    Overlays(Overlays),

    /// Analyzer FIFO blocks were overwritten before being read
    /// Totals since engine start, per channel
    FifoOverrun { left: u64, right: u64 },

    /// Analyzer switched on or off
    AnalyzerToggled { enabled: bool },

    /// Error occurred
    Error { message: String },
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::FifoOverrun { left: 3, right: 0 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("FifoOverrun"));
        assert!(json.contains("payload"));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_error_event() {
        let event = Event::error("Test error message");
        if let Event::Error { message } = event {
            assert_eq!(message, "Test error message");
        } else {
            panic!("Should be Error variant");
        }
    }

    #[test]
    fn test_overlays_event_serialization() {
        let mut overlays = Overlays::default();
        overlays.response.push(0.0, 120.0);
        overlays.response.push(1.0, 118.5);

        let json = serde_json::to_string(&Event::Overlays(overlays.clone())).unwrap();
        assert!(json.contains("\"type\":\"Overlays\""));

        if let Event::Overlays(deserialized) = serde_json::from_str(&json).unwrap() {
            assert_eq!(deserialized, overlays);
            assert!(deserialized.left.is_none());
        } else {
            panic!("Wrong variant");
        }
    }
}
