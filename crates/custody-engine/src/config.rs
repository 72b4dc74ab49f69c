//! Engine configuration.
//!
//! All settings have defaults, so an empty JSON object is a valid config.
//!
//! ## Environment Variables
//! - `CUSTODY_HORIZON_WEEKS`: weeks of schedule expansion (default 4)
//! - `CUSTODY_OCCURRENCE_LIMIT`: cap on expanded occurrences per recurring
//!   imported event (default 12)
//! - `CUSTODY_WEEK_START`: `monday` or `sunday` (default `monday`)

use std::path::Path;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{CustodyError, Result};

pub const DEFAULT_HORIZON_WEEKS: u32 = 4;
pub const DEFAULT_OCCURRENCE_LIMIT: usize = 12;

/// Which day begins a week for biweekly parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    /// ISO 8601 standard (Monday = day 0 of the week).
    #[default]
    Monday,
    /// US/Canada convention (Sunday = day 0 of the week).
    Sunday,
}

impl WeekStartDay {
    /// How many days `weekday` is from the week-start day.
    pub fn days_from_start(self, weekday: Weekday) -> i64 {
        match self {
            WeekStartDay::Monday => weekday.num_days_from_monday() as i64,
            WeekStartDay::Sunday => weekday.num_days_from_sunday() as i64,
        }
    }
}

impl std::str::FromStr for WeekStartDay {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(WeekStartDay::Monday),
            "sunday" | "sun" => Ok(WeekStartDay::Sunday),
            other => Err(CustodyError::Config(format!(
                "week start must be 'monday' or 'sunday', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Weeks of occurrences generated from a schedule template.
    pub horizon_weeks: u32,
    /// Occurrences produced per recurring event during import.
    pub occurrence_limit: usize,
    pub week_start: WeekStartDay,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_weeks: DEFAULT_HORIZON_WEEKS,
            occurrence_limit: DEFAULT_OCCURRENCE_LIMIT,
            week_start: WeekStartDay::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CustodyError::Config(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CustodyError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Override fields from `CUSTODY_*` environment variables.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("CUSTODY_HORIZON_WEEKS") {
            self.horizon_weeks = raw.trim().parse().map_err(|_| {
                CustodyError::Config(format!("CUSTODY_HORIZON_WEEKS: invalid number '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup("CUSTODY_OCCURRENCE_LIMIT") {
            self.occurrence_limit = raw.trim().parse().map_err(|_| {
                CustodyError::Config(format!("CUSTODY_OCCURRENCE_LIMIT: invalid number '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup("CUSTODY_WEEK_START") {
            self.week_start = raw.parse()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.occurrence_limit, 12);
    }

    #[test]
    fn test_partial_json() {
        let config =
            EngineConfig::from_json_str(r#"{"horizon_weeks": 8, "week_start": "sunday"}"#)
                .unwrap();
        assert_eq!(config.horizon_weeks, 8);
        assert_eq!(config.week_start, WeekStartDay::Sunday);
        assert_eq!(config.occurrence_limit, DEFAULT_OCCURRENCE_LIMIT);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = EngineConfig::from_json_str(r#"{"horizon_weeks": "many"}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Configuration error"), "got: {err}");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CUSTODY_HORIZON_WEEKS", "10"),
            ("CUSTODY_WEEK_START", "Sunday"),
        ]);
        let config = EngineConfig::default()
            .apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.horizon_weeks, 10);
        assert_eq!(config.week_start, WeekStartDay::Sunday);
        assert_eq!(config.occurrence_limit, 12);
    }

    #[test]
    fn test_env_rejects_invalid_values() {
        let result = EngineConfig::default().apply_vars(|k| {
            (k == "CUSTODY_OCCURRENCE_LIMIT").then(|| "lots".to_string())
        });
        assert!(result.is_err());

        let result = EngineConfig::default()
            .apply_vars(|k| (k == "CUSTODY_WEEK_START").then(|| "friday".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_days_from_week_start() {
        assert_eq!(WeekStartDay::Monday.days_from_start(Weekday::Mon), 0);
        assert_eq!(WeekStartDay::Monday.days_from_start(Weekday::Sun), 6);
        assert_eq!(WeekStartDay::Sunday.days_from_start(Weekday::Sun), 0);
        assert_eq!(WeekStartDay::Sunday.days_from_start(Weekday::Sat), 6);
    }
}
