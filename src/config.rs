use crate::domain::Decimal;
use crate::engine::DistributionPolicy;
use std::collections::HashMap;
use thiserror::Error;

/// Total basis points in a whole (100%).
const BPS_SCALE: i64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Interval between scheduled batch runs; 0 disables the scheduler.
    pub settlement_interval_ms: i64,
    pub platform_share_bps: i64,
    pub level1_share_bps: i64,
    pub level2_share_bps: i64,
    /// Currency recorded on platform earnings.
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let settlement_interval_ms = parse_non_negative(&env_map, "SETTLEMENT_INTERVAL_MS", 0)?;

        let platform_share_bps = parse_share_bps(&env_map, "PLATFORM_SHARE_BPS", 1000)?;
        let level1_share_bps = parse_share_bps(&env_map, "LEVEL1_SHARE_BPS", 2000)?;
        let level2_share_bps = parse_share_bps(&env_map, "LEVEL2_SHARE_BPS", 1000)?;

        if platform_share_bps + level1_share_bps + level2_share_bps > BPS_SCALE {
            return Err(ConfigError::InvalidValue(
                "PLATFORM_SHARE_BPS".to_string(),
                "share rates must sum to at most 10000 bps".to_string(),
            ));
        }

        let currency = env_map
            .get("SETTLEMENT_CURRENCY")
            .cloned()
            .unwrap_or_else(|| "USDT".to_string());

        Ok(Config {
            port,
            database_path,
            settlement_interval_ms,
            platform_share_bps,
            level1_share_bps,
            level2_share_bps,
            currency,
        })
    }

    /// Distribution policy derived from the configured basis points.
    pub fn distribution_policy(&self) -> DistributionPolicy {
        DistributionPolicy {
            platform_rate: Decimal::from_basis_points(self.platform_share_bps),
            level1_rate: Decimal::from_basis_points(self.level1_share_bps),
            level2_rate: Decimal::from_basis_points(self.level2_share_bps),
        }
    }
}

fn parse_non_negative(
    env_map: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let value = match env_map.get(key) {
        Some(s) => s.parse::<i64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid i64".to_string())
        })?,
        None => default,
    };
    if value < 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be non-negative".to_string(),
        ));
    }
    Ok(value)
}

fn parse_share_bps(
    env_map: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let value = parse_non_negative(env_map, key, default)?;
    if value > BPS_SCALE {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at most {} bps, got {}", BPS_SCALE, value),
        ));
    }
    Ok(value)
}
