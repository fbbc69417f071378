//! TOML-based configuration for relscout.
//!
//! Example configuration:
//! ```toml
//! replace_default_patterns = false
//!
//! [detection]
//! semantic_floor = 0.6
//! include_table_name = true
//! overlap_sample_size = 50
//! acceptance_floor = 0.5
//! accept_threshold = 0.8
//!
//! [fusion]
//! pattern = 0.45
//! semantic = 0.25
//! overlap = 0.30
//!
//! [verification]
//! budget = 10
//! batch_size = 5
//! timeout = "30s"
//!
//! [[patterns]]
//! name = "suffix_no"
//! kind = "suffix"
//! pattern = "_no"
//! weight = 0.6
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::semantic::inference::fusion::{
    DEFAULT_OVERLAP_WEIGHT, DEFAULT_PATTERN_WEIGHT, DEFAULT_SEMANTIC_WEIGHT,
};
use crate::semantic::inference::signals::overlap::{DEFAULT_SAMPLE_SIZE, DEFAULT_TARGET_CAP};
use crate::semantic::inference::signals::semantic::DEFAULT_DIMENSION;
use crate::semantic::inference::verify::{DEFAULT_BATCH_SIZE, DEFAULT_BUDGET, DEFAULT_TIMEOUT};
use crate::semantic::inference::{
    default_rules, thresholds, DetectionConfig, FusionWeights, PatternRule, Resolution,
    DEFAULT_SEMANTIC_FLOOR,
};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "RELSCOUT_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("Invalid pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Use only `[[patterns]]` instead of appending them to the defaults.
    pub replace_default_patterns: bool,

    /// Detection thresholds and sampling.
    pub detection: DetectionSettings,

    /// Signal weights.
    pub fusion: FusionSettings,

    /// External verification.
    pub verification: VerificationSettings,

    /// Additional pattern rules.
    pub patterns: Vec<PatternSettings>,
}

/// Detection settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum name similarity for semantic-only candidates.
    pub semantic_floor: f64,

    /// Prefix source-column texts with the table name.
    pub include_table_name: bool,

    /// Hashing embedder dimension.
    pub embedding_dimension: usize,

    /// Distinct source values checked per candidate (K).
    pub overlap_sample_size: usize,

    /// Distinct target values held per candidate.
    pub target_sample_cap: usize,

    /// Confidence below which candidates are rejected.
    pub acceptance_floor: f64,

    /// Confidence at or above which candidates are accepted.
    pub accept_threshold: f64,

    /// Near-tie distance for ambiguity.
    pub ambiguity_tolerance: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            semantic_floor: DEFAULT_SEMANTIC_FLOOR,
            include_table_name: true,
            embedding_dimension: DEFAULT_DIMENSION,
            overlap_sample_size: DEFAULT_SAMPLE_SIZE,
            target_sample_cap: DEFAULT_TARGET_CAP,
            acceptance_floor: thresholds::confidence::FLOOR,
            accept_threshold: thresholds::confidence::ACCEPT,
            ambiguity_tolerance: thresholds::confidence::AMBIGUITY_TOLERANCE,
        }
    }
}

/// Fusion weights (normalized when applied).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FusionSettings {
    pub pattern: f64,
    pub semantic: f64,
    pub overlap: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN_WEIGHT,
            semantic: DEFAULT_SEMANTIC_WEIGHT,
            overlap: DEFAULT_OVERLAP_WEIGHT,
        }
    }
}

/// Verification settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationSettings {
    /// Maximum candidates sent per run.
    pub budget: usize,

    /// Candidates per verifier call.
    pub batch_size: usize,

    /// Per-call timeout (e.g., "30s", "2m", "500ms").
    pub timeout: String,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: format!("{}s", DEFAULT_TIMEOUT.as_secs()),
        }
    }
}

/// Kind of a configured pattern rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKindSetting {
    Suffix,
    Prefix,
    PrimaryKeyName,
    Regex,
}

/// Resolution strategy of a configured pattern rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSetting {
    TableName,
    PrimaryKey,
}

/// A `[[patterns]]` row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternSettings {
    pub name: String,

    pub kind: PatternKindSetting,

    /// Suffix, prefix or regex text. Unused for `primary_key_name`.
    #[serde(default)]
    pub pattern: String,

    /// For prefix rules: suffix stripped from the remainder.
    #[serde(default)]
    pub strip_suffix: Option<String>,

    /// Pattern score (0.0 to 1.0).
    pub weight: f64,

    /// Overrides the kind's default resolution.
    #[serde(default)]
    pub resolution: Option<ResolutionSetting>,
}

impl PatternSettings {
    /// Build the rule this row describes.
    pub fn to_rule(&self) -> Result<PatternRule, SettingsError> {
        let invalid = |reason: &str| SettingsError::InvalidPattern {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(invalid("weight must be between 0 and 1"));
        }
        let needs_pattern = self.kind != PatternKindSetting::PrimaryKeyName;
        if needs_pattern && self.pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let rule = match self.kind {
            PatternKindSetting::Suffix => {
                PatternRule::suffix(&self.name, &self.pattern, self.weight)
            }
            PatternKindSetting::Prefix => PatternRule::prefix(
                &self.name,
                &self.pattern,
                self.strip_suffix.as_deref(),
                self.weight,
            ),
            PatternKindSetting::PrimaryKeyName => {
                PatternRule::primary_key_name(&self.name, self.weight)
            }
            PatternKindSetting::Regex => {
                let re = Regex::new(&self.pattern).map_err(|e| invalid(&e.to_string()))?;
                PatternRule::regex(&self.name, re, self.weight)
            }
        };

        Ok(match self.resolution {
            Some(ResolutionSetting::TableName) => rule.with_resolution(Resolution::TableName),
            Some(ResolutionSetting::PrimaryKey) => rule.with_resolution(Resolution::PrimaryKey),
            None => rule,
        })
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `RELSCOUT_CONFIG`
    /// 2. `./relscout.toml`
    /// 3. `~/.config/relscout/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("relscout.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("relscout").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Validate and convert into a detection configuration.
    pub fn to_detection_config(&self) -> Result<DetectionConfig, SettingsError> {
        let d = &self.detection;

        for (name, value) in [
            ("detection.semantic_floor", d.semantic_floor),
            ("detection.acceptance_floor", d.acceptance_floor),
            ("detection.accept_threshold", d.accept_threshold),
            ("detection.ambiguity_tolerance", d.ambiguity_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::InvalidConfig(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if d.acceptance_floor > d.accept_threshold {
            return Err(SettingsError::InvalidConfig(format!(
                "detection.acceptance_floor ({}) is above detection.accept_threshold ({})",
                d.acceptance_floor, d.accept_threshold
            )));
        }
        if d.overlap_sample_size == 0 || d.target_sample_cap == 0 || d.embedding_dimension == 0 {
            return Err(SettingsError::InvalidConfig(
                "sample sizes and embedding dimension must be positive".to_string(),
            ));
        }
        if self.verification.batch_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "verification.batch_size must be positive".to_string(),
            ));
        }

        let weights =
            FusionWeights::normalized(self.fusion.pattern, self.fusion.semantic, self.fusion.overlap)
                .ok_or_else(|| {
                    SettingsError::InvalidConfig(
                        "fusion weights must be non-negative and not all zero".to_string(),
                    )
                })?;

        let mut rules = if self.replace_default_patterns {
            Vec::new()
        } else {
            default_rules()
        };
        for pattern in &self.patterns {
            rules.push(pattern.to_rule()?);
        }

        Ok(DetectionConfig::default()
            .with_rules(rules)
            .with_semantic_floor(d.semantic_floor)
            .with_table_name_in_text(d.include_table_name)
            .with_embedding_dimension(d.embedding_dimension)
            .with_overlap_sample_size(d.overlap_sample_size)
            .with_target_sample_cap(d.target_sample_cap)
            .with_fusion_weights(weights)
            .with_acceptance_floor(d.acceptance_floor)
            .with_accept_threshold(d.accept_threshold)
            .with_ambiguity_tolerance(d.ambiguity_tolerance)
            .with_verification_budget(self.verification.budget)
            .with_verification_batch_size(self.verification.batch_size)
            .with_verifier_timeout(parse_duration(&self.verification.timeout)?))
    }
}

/// Parse a duration like `"30s"`, `"2m"`, `"500ms"` or `"1h"`.
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, SettingsError> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| SettingsError::InvalidDuration(s.to_string()))?;

    let secs = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| SettingsError::InvalidDuration(s.to_string()))
    };
    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => secs(60),
        "h" => secs(3600),
        _ => Err(SettingsError::InvalidDuration(s.to_string())),
    }
}
