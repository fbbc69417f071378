//! Configuration module for relscout.
//!
//! Handles the settings file and its mapping onto [`DetectionConfig`].
//!
//! [`DetectionConfig`]: crate::semantic::inference::DetectionConfig

mod settings;

pub use settings::{
    parse_duration, DetectionSettings, FusionSettings, PatternKindSetting, PatternSettings,
    ResolutionSetting, Settings, SettingsError, VerificationSettings, CONFIG_ENV_VAR,
};
