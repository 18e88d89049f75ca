//! Built-in EQ Presets

use crate::settings::{ChainSettings, Slope};

/// Named set of complete chain settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub settings: ChainSettings,
}

/// List of built-in presets
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "Flat",
        settings: ChainSettings::FLAT,
    },
    Preset {
        name: "Rumble Filter",
        settings: ChainSettings {
            low_cut_freq: 40.0,
            low_cut_slope: Slope::Db48,
            ..ChainSettings::FLAT
        },
    },
    Preset {
        name: "Telephone",
        settings: ChainSettings {
            low_cut_freq: 300.0,
            low_cut_slope: Slope::Db24,
            high_cut_freq: 3400.0,
            high_cut_slope: Slope::Db24,
            peak_freq: 1500.0,
            peak_gain_db: 4.0,
            peak_q: 0.7,
            ..ChainSettings::FLAT
        },
    },
    Preset {
        name: "Presence Boost",
        settings: ChainSettings {
            peak_freq: 4000.0,
            peak_gain_db: 5.0,
            peak_q: 1.2,
            low_cut_freq: 60.0,
            ..ChainSettings::FLAT
        },
    },
    Preset {
        name: "Mud Cut",
        settings: ChainSettings {
            peak_freq: 300.0,
            peak_gain_db: -6.0,
            peak_q: 1.4,
            low_cut_freq: 30.0,
            low_cut_slope: Slope::Db24,
            ..ChainSettings::FLAT
        },
    },
    Preset {
        name: "Hiss Filter",
        settings: ChainSettings {
            high_cut_freq: 9000.0,
            high_cut_slope: Slope::Db36,
            ..ChainSettings::FLAT
        },
    },
    Preset {
        name: "60 Hz Hum Notch",
        settings: ChainSettings {
            peak_freq: 60.0,
            peak_gain_db: -24.0,
            peak_q: 10.0,
            ..ChainSettings::FLAT
        },
    },
];

/// Look up a preset by name, ignoring case
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.name.eq_ignore_ascii_case(name))
}
