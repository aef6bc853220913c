//! Core configuration.
//!
//! # Responsibility
//! - Hold the tunables for stats derivation and the optimistic overlay.
//! - Load them from JSON with every field optional.
//!
//! # Invariants
//! - `CoreConfig::default()` is always valid.
//! - Loaded configs are validated before use.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_TREND_DAYS: u32 = 366;

/// Which day the current streak is anchored on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakAnchor {
    /// Count back from the most recent day with activity.
    #[default]
    LatestActivity,
    /// Count back from today; no activity today means no current streak.
    Today,
}

/// Date used for monthly bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    #[default]
    CreatedAt,
    /// Journal entry date, falling back to the creation day.
    ActivityDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// How many tags `top_tags` keeps.
    pub top_tags_limit: usize,
    pub streak_anchor: StreakAnchor,
    pub month_field: DateField,
    /// Length of the completion trend window, in days, ending today.
    pub trend_days: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_tags_limit: 10,
            streak_anchor: StreakAnchor::default(),
            month_field: DateField::default(),
            trend_days: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Snapshots an unconfirmed optimistic write survives before the
    /// snapshot is taken as the truth.
    pub pending_snapshot_limit: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            pending_snapshot_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub stats: StatsConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config is not valid JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config; missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stats.trend_days == 0 || self.stats.trend_days > MAX_TREND_DAYS {
            return Err(ConfigError::Invalid(format!(
                "stats.trend_days must be in 1..={MAX_TREND_DAYS}, got {}",
                self.stats.trend_days
            )));
        }
        Ok(())
    }
}
