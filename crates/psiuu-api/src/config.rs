//! # Finance Configuration
//!
//! Configuration management for the finance client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PSIUU_API_URL=https://api.psiuu.app/api                            │
//! │     PSIUU_API_TOKEN=...                                                │
//! │     PSIUU_USD_BRL_RATE=5.50                                            │
//! │     PSIUU_STORE_FEE_PERCENT=15                                         │
//! │     PSIUU_MOCK_FALLBACK=true                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/psiuu-finance/finance.toml (Linux)                       │
//! │     ~/Library/Application Support/app.psiuu.finance/finance.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # finance.toml
//! [api]
//! base_url = "https://api.psiuu.app/api"
//! timeout_secs = 15
//!
//! [rules]
//! store_fee_bps = 1500
//! usd_brl_rate = 5.5
//!
//! [fallback]
//! mock_on_failure = true
//! seed = 42
//!
//! [payouts]
//! call_timeout_secs = 30
//! ```
//!
//! Invalid rules are fatal: [`FinanceConfig::load`] refuses to return a
//! config whose tier prices are not positive.

use psiuu_core::{ExchangeRate, FinanceRules, Rate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where the finance API lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL, endpoints are appended (`{base_url}/finance/sales`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Usually supplied through `PSIUU_API_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total time spent retrying a failed read (seconds). 0 disables retry.
    #[serde(default = "default_max_retry")]
    pub max_retry_secs: u64,
}

fn default_base_url() -> String {
    "https://api.psiuu.app/api".to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_max_retry() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout(),
            max_retry_secs: default_max_retry(),
        }
    }
}

// =============================================================================
// Fallback Settings
// =============================================================================

/// Mock-data fallback for when the API cannot be reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// Serve generated data when the API is unreachable (connection
    /// failures, timeouts, 5xx). Bad payloads and auth errors still surface,
    /// and payout actions are refused while any collection is mocked.
    #[serde(default = "default_true")]
    pub mock_on_failure: bool,

    /// Seed for the generators, so a fallback session is reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of generated sales.
    #[serde(default = "default_sales_count")]
    pub sales_count: usize,
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

fn default_sales_count() -> usize {
    200
}

impl Default for FallbackSettings {
    fn default() -> Self {
        FallbackSettings {
            mock_on_failure: true,
            seed: default_seed(),
            sales_count: default_sales_count(),
        }
    }
}

// =============================================================================
// Payout Settings
// =============================================================================

/// Payout processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSettings {
    /// Time limit for one payout call during batch payment (seconds).
    /// 0 means no limit beyond the HTTP timeout.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_call_timeout() -> u64 {
    30
}

impl Default for PayoutSettings {
    fn default() -> Self {
        PayoutSettings {
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl PayoutSettings {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

// =============================================================================
// Main Finance Configuration
// =============================================================================

/// Complete finance configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinanceConfig {
    #[serde(default)]
    pub api: ApiSettings,

    /// Prices, rates, threshold.
    #[serde(default)]
    pub rules: FinanceRules,

    #[serde(default)]
    pub fallback: FallbackSettings,

    #[serde(default)]
    pub payouts: PayoutSettings,
}

impl FinanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (finance.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ApiResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading finance config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ApiResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ApiError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ApiError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ApiError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Finance config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ApiResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ApiError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ApiError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        self.rules
            .validate()
            .map_err(|e| ApiError::InvalidConfig(format!("rules: {}", e)))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("PSIUU_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(token) = var("PSIUU_API_TOKEN") {
            self.api.token = Some(token);
        }

        if let Some(rate) = var("PSIUU_USD_BRL_RATE") {
            match rate.trim().parse::<f64>().map(ExchangeRate::try_from_decimal) {
                Ok(Ok(parsed)) => {
                    debug!(rate = %parsed, "Overriding USD/BRL rate from environment");
                    self.rules.usd_brl_rate = parsed;
                }
                _ => warn!(rate = %rate, "Ignoring invalid PSIUU_USD_BRL_RATE"),
            }
        }

        if let Some(pct) = var("PSIUU_STORE_FEE_PERCENT") {
            match pct.trim().parse::<f64>() {
                Ok(p) if p.is_finite() && (0.0..=100.0).contains(&p) => {
                    self.rules.store_fee_bps = Rate::from_percentage(p).bps();
                }
                _ => warn!(value = %pct, "Ignoring invalid PSIUU_STORE_FEE_PERCENT"),
            }
        }

        if let Some(flag) = var("PSIUU_MOCK_FALLBACK") {
            match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.fallback.mock_on_failure = true,
                "0" | "false" | "no" | "off" => self.fallback.mock_on_failure = false,
                _ => warn!(value = %flag, "Unknown PSIUU_MOCK_FALLBACK value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "psiuu", "finance")
            .map(|dirs| dirs.config_dir().join("finance.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn is_fallback_enabled(&self) -> bool {
        self.fallback.mock_on_failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = FinanceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "https://api.psiuu.app/api");
        assert_eq!(config.rules.store_fee_bps, 1500);
        assert!(config.is_fallback_enabled());
        assert_eq!(config.payouts.call_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = FinanceConfig::default();

        config.api.base_url = "ftp://files.psiuu.app".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "http://localhost:3000/api".to_string();
        assert!(config.validate().is_ok());

        config.rules.tier_prices_cents.credits_15 = 0;
        assert!(matches!(config.validate(), Err(ApiError::InvalidConfig(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PSIUU_API_URL", "http://localhost:3000/api"),
            ("PSIUU_API_TOKEN", "tok"),
            ("PSIUU_USD_BRL_RATE", "5.25"),
            ("PSIUU_STORE_FEE_PERCENT", "30"),
            ("PSIUU_MOCK_FALLBACK", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = FinanceConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.base_url(), "http://localhost:3000/api");
        assert_eq!(config.api.token.as_deref(), Some("tok"));
        assert_eq!(config.rules.usd_brl_rate.scaled(), 52_500);
        assert_eq!(config.rules.store_fee_bps, 3000);
        assert!(!config.is_fallback_enabled());
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = FinanceConfig::default();
        config.apply_overrides(|k| match k {
            "PSIUU_USD_BRL_RATE" => Some("NaN".to_string()),
            "PSIUU_STORE_FEE_PERCENT" => Some("150".to_string()),
            _ => None,
        });
        assert_eq!(config.rules.usd_brl_rate.scaled(), 55_000);
        assert_eq!(config.rules.store_fee_bps, 1500);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("finance.toml");

        let mut config = FinanceConfig::default();
        config.fallback.seed = 7;
        config.rules.payout_due_days = 30;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[api]"));
        assert!(contents.contains("[rules]"));

        let parsed: FinanceConfig = toml::from_str(&contents).unwrap();
        assert_eq!(parsed.fallback.seed, 7);
        assert_eq!(parsed.rules.payout_due_days, 30);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: FinanceConfig = toml::from_str(
            r#"
            [rules]
            usd_brl_rate = 5.0

            [rules.tier_prices_cents]
            credits_8 = 990
            credits_15 = 1990
            credits_30 = 3990
            "#,
        )
        .unwrap();
        assert_eq!(parsed.rules.usd_brl_rate.scaled(), 50_000);
        assert_eq!(parsed.rules.tier_prices_cents.credits_8, 990);
        assert_eq!(parsed.api.timeout_secs, 15);
        assert!(parsed.validate().is_ok());
    }
}
