//! Configuration management for the FLUPSY Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with FLUPSY_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::analytics::AnalyticsThresholds;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Analytics report tuning
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Lookback window used when no explicit date range is given
    pub default_period_days: i64,

    /// Fraction of the initial count sold for a lot to count as sold
    pub sold_threshold: f64,

    /// Mortality percentage above which risk is "medio"
    pub risk_medium_percent: f64,

    /// Mortality percentage above which risk is "alto"
    pub risk_high_percent: f64,
}

impl AnalyticsConfig {
    /// Thresholds handed to the shared roll-up helpers
    pub fn thresholds(&self) -> AnalyticsThresholds {
        let defaults = AnalyticsThresholds::default();
        AnalyticsThresholds {
            sold_threshold: Decimal::from_f64(self.sold_threshold)
                .unwrap_or(defaults.sold_threshold),
            risk_medium_percent: Decimal::from_f64(self.risk_medium_percent)
                .unwrap_or(defaults.risk_medium_percent),
            risk_high_percent: Decimal::from_f64(self.risk_high_percent)
                .unwrap_or(defaults.risk_high_percent),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_period_days: 30,
            sold_threshold: 0.9,
            risk_medium_percent: 5.0,
            risk_high_percent: 10.0,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("FLUPSY_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("analytics.default_period_days", 30)?
            .set_default("analytics.sold_threshold", 0.9)?
            .set_default("analytics.risk_medium_percent", 5.0)?
            .set_default("analytics.risk_high_percent", 10.0)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FLUPSY_ prefix)
            .add_source(
                Environment::with_prefix("FLUPSY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_match_shared_defaults() {
        let thresholds = AnalyticsConfig::default().thresholds();
        assert_eq!(thresholds, AnalyticsThresholds::default());
    }

    #[test]
    fn test_custom_thresholds() {
        let config = AnalyticsConfig {
            default_period_days: 60,
            sold_threshold: 0.8,
            risk_medium_percent: 3.0,
            risk_high_percent: 7.5,
        };
        let thresholds = config.thresholds();
        assert_eq!(thresholds.sold_threshold, Decimal::new(8, 1));
        assert_eq!(thresholds.risk_high_percent, Decimal::new(75, 1));
    }
}
