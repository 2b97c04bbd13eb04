use chrono::NaiveDate;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::services::ledger::DEFAULT_MAX_UPDATE_ATTEMPTS;

/// Records dated before this day may only exist in the legacy collection.
pub const DEFAULT_LEGACY_CUTOFF: &str = "2024-01-01";

#[derive(Debug, Clone, Deserialize)]
pub struct SalesConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub legacy_cutoff: NaiveDate,
    pub max_update_attempts: u32,
}

impl SalesConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = common_config.is_production();

        let legacy_cutoff = get_env("LEGACY_CUTOFF_DATE", Some(DEFAULT_LEGACY_CUTOFF), false)?;
        let legacy_cutoff = NaiveDate::parse_from_str(legacy_cutoff.trim(), "%Y-%m-%d")
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "LEGACY_CUTOFF_DATE must be YYYY-MM-DD: {}",
                    e
                ))
            })?;

        let max_update_attempts = get_env(
            "LEDGER_MAX_UPDATE_ATTEMPTS",
            Some(&DEFAULT_MAX_UPDATE_ATTEMPTS.to_string()),
            false,
        )?
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "LEDGER_MAX_UPDATE_ATTEMPTS must be a positive integer"
            ))
        })?;

        Ok(SalesConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: Secret::new(get_env("MONGODB_URI", None, is_prod)?),
                database: get_env("MONGODB_DATABASE", Some("sales_db"), is_prod)?,
            },
            ledger: LedgerConfig {
                legacy_cutoff,
                max_update_attempts,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
