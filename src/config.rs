use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::engine::LeadTimePolicy;
use crate::limits::{DEFAULT_SERVICE_MINUTES, MAX_APPOINTMENT_MINUTES, MAX_MIN_LEAD_HOURS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} out of range: {value}")]
    OutOfRange { var: &'static str, value: u32 },
}

/// Runtime settings. Every field has a default; `SLOTWISE_*` environment
/// variables override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub min_lead_hours: u32,
    pub lead_policy: LeadTimePolicy,
    /// Used for bookings that carry no duration of their own.
    pub service_minutes: u32,
    /// WAL appends between compactions; 0 disables compaction.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            min_lead_hours: 0,
            lead_policy: LeadTimePolicy::DayStart,
            service_minutes: DEFAULT_SERVICE_MINUTES,
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            data_dir: lookup("SLOTWISE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parse_opt(&lookup, "SLOTWISE_METRICS_PORT")?,
            min_lead_hours: parse_opt(&lookup, "SLOTWISE_MIN_LEAD_HOURS")?
                .unwrap_or(defaults.min_lead_hours),
            lead_policy: parse_opt(&lookup, "SLOTWISE_LEAD_POLICY")?
                .unwrap_or(defaults.lead_policy),
            service_minutes: parse_opt(&lookup, "SLOTWISE_SERVICE_DURATION_MINUTES")?
                .unwrap_or(defaults.service_minutes),
            compact_threshold: parse_opt(&lookup, "SLOTWISE_COMPACT_THRESHOLD")?
                .unwrap_or(defaults.compact_threshold),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_lead_hours > MAX_MIN_LEAD_HOURS {
            return Err(ConfigError::OutOfRange {
                var: "SLOTWISE_MIN_LEAD_HOURS",
                value: self.min_lead_hours,
            });
        }
        if self.service_minutes == 0 || self.service_minutes > MAX_APPOINTMENT_MINUTES {
            return Err(ConfigError::OutOfRange {
                var: "SLOTWISE_SERVICE_DURATION_MINUTES",
                value: self.service_minutes,
            });
        }
        Ok(())
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("slotwise.wal")
    }
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
