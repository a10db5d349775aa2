//! Runtime configuration loaded from YAML.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest rolling volume window accepted, one year.
pub const MAX_VOLUME_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid config file: {0}")]
    Parse(String),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

/// Settings for fetching market data and running reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Base URL of the tRPC API, without a trailing procedure name.
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Orders per side requested for depth analysis.
    pub order_limit: u32,
    /// Bids at or below this price are treated as dust and ignored.
    pub min_bid_price: Decimal,
    pub volume_window_hours: i64,
    /// Upper bound on trade-history pages fetched per volume query.
    pub max_trade_pages: usize,
    pub trade_page_size: u32,
    /// Reference wage paid per production point.
    pub cost_per_pp: Decimal,
    /// Fractional production bonus, e.g. 0.25 for +25%.
    pub production_bonus: Decimal,
    /// Apply the deposit bonus to raw materials in break-even calculations.
    pub use_deposit_bonus: bool,
    /// Alternative recipe file; the built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api2.warera.io/trpc".to_string(),
            request_timeout_secs: 15,
            order_limit: 10,
            min_bid_price: Decimal::new(1, 3),
            volume_window_hours: 24,
            max_trade_pages: 50,
            trade_page_size: 100,
            cost_per_pp: Decimal::new(1, 1),
            production_bonus: Decimal::ZERO,
            use_deposit_bonus: false,
            catalog_path: None,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if self.order_limit == 0 {
            return Err(invalid("order_limit", "must be > 0"));
        }
        if self.min_bid_price < Decimal::ZERO {
            return Err(invalid("min_bid_price", "must be >= 0"));
        }
        if self.volume_window_hours <= 0 || self.volume_window_hours > MAX_VOLUME_WINDOW_HOURS {
            return Err(invalid("volume_window_hours", "must be between 1 and 8760"));
        }
        if self.max_trade_pages == 0 || self.trade_page_size == 0 {
            return Err(invalid("max_trade_pages", "pagination bounds must be > 0"));
        }
        if self.cost_per_pp <= Decimal::ZERO {
            return Err(invalid("cost_per_pp", "must be > 0"));
        }
        if self.production_bonus < Decimal::ZERO {
            return Err(invalid("production_bonus", "must be >= 0"));
        }
        Ok(())
    }

    /// The window as a duration, clamped to `0..=MAX_VOLUME_WINDOW_HOURS`
    /// for configs that skipped [`validate`](Self::validate).
    pub fn volume_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.volume_window_hours.clamp(0, MAX_VOLUME_WINDOW_HOURS))
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
