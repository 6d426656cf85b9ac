use crate::error::ConfigError;
use crate::loader::InvalidationPolicy;
use crate::scheduler::DEFAULT_COOLDOWN_HOURS;
use chrono::TimeDelta;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "data/CLAARITY_with_alo_AF_.xlsx";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Deployment settings for the dashboard
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardConfig {
    /// Spreadsheet file the dashboard reads
    pub data_path: PathBuf,

    /// Address the web server listens on
    pub bind_addr: String,

    /// Minimum hours between backend cache clears
    pub clear_cooldown_hours: i64,

    /// What marks the dataset memo as stale
    pub invalidation: InvalidationPolicy,

    /// Rows shown in the dataset overview
    pub preview_rows: usize,

    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            clear_cooldown_hours: DEFAULT_COOLDOWN_HOURS,
            invalidation: InvalidationPolicy::default(),
            preview_rows: 5,
            chart_width: 640,
            chart_height: 480,
        }
    }
}

impl DashboardConfig {
    /// Reads `DASHBOARD_*` variables from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds a config from a variable map; unset keys keep their defaults
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = vars.get("DASHBOARD_DATA") {
            config.data_path = PathBuf::from(path);
        }
        if let Some(addr) = vars.get("DASHBOARD_BIND") {
            config.bind_addr = addr.clone();
        }
        if let Some(hours) = vars.get("DASHBOARD_CLEAR_HOURS") {
            config.clear_cooldown_hours = parse_cooldown_hours(hours)?;
        }
        if let Some(policy) = vars.get("DASHBOARD_INVALIDATION") {
            config.invalidation = parse_policy(policy)?;
        }
        if let Some(rows) = vars.get("DASHBOARD_PREVIEW_ROWS") {
            config.preview_rows = parse_positive("DASHBOARD_PREVIEW_ROWS", rows)?;
        }
        if let Some(width) = vars.get("DASHBOARD_CHART_WIDTH") {
            config.chart_width = parse_positive("DASHBOARD_CHART_WIDTH", width)?;
        }
        if let Some(height) = vars.get("DASHBOARD_CHART_HEIGHT") {
            config.chart_height = parse_positive("DASHBOARD_CHART_HEIGHT", height)?;
        }

        Ok(config)
    }

    /// Positional data path argument, if given, overrides the environment
    pub fn with_data_arg(mut self, arg: Option<String>) -> Self {
        if let Some(path) = arg.filter(|p| !p.is_empty()) {
            self.data_path = PathBuf::from(path);
        }
        self
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "expected a positive integer"))?;
    if parsed <= T::default() {
        return Err(invalid(key, value, "must be greater than zero"));
    }
    Ok(parsed)
}

fn parse_cooldown_hours(value: &str) -> Result<i64, ConfigError> {
    let hours: i64 = parse_positive("DASHBOARD_CLEAR_HOURS", value)?;
    if TimeDelta::try_hours(hours).is_none() {
        return Err(invalid(
            "DASHBOARD_CLEAR_HOURS",
            value,
            "too large for a time span",
        ));
    }
    Ok(hours)
}

fn parse_policy(value: &str) -> Result<InvalidationPolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "never" | "none" => Ok(InvalidationPolicy::Never),
        "mtime" | "modified" => Ok(InvalidationPolicy::ModifiedTime),
        "hash" | "content" => Ok(InvalidationPolicy::ContentHash),
        _ => Err(invalid(
            "DASHBOARD_INVALIDATION",
            value,
            "expected one of never, mtime, hash",
        )),
    }
}
