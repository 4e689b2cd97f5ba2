//! Configuration file management.
//!
//! The daemon reads `config.toml` from its data directory. Amounts and the
//! funding address have no sensible default and must be set; everything
//! else falls back to the defaults below. The signing key never lives in
//! this file: `wallet.signing_key_env` names the environment variable it
//! is read from.

use std::path::PathBuf;
use std::time::Duration;

use payout_engine::executor::EngineSettings;
use payout_engine::secrets::{Secrets, SigningKey};
use payout_select::greedy::SelectionPolicy;
use payout_types::{Address, DEFAULT_COINBASE_MATURITY};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PAYOUT_DATA_DIR";

/// Complete daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Cycle settings.
    pub engine: EngineConfig,
    /// Funding wallet settings.
    pub wallet: WalletConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Block explorer settings.
    #[serde(default)]
    pub explorer: ExplorerConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Pay out only when the balance is strictly above this.
    pub balance_threshold: u64,
    /// Amount split across recipients per payout, in base units.
    pub base_unit: u64,
    /// Fee per transaction output, in base units.
    pub per_output_fee_rate: u64,
    /// Blocks before a coinbase output may be spent.
    #[serde(default = "default_coinbase_maturity")]
    pub coinbase_maturity: u32,
    /// Limit for each external call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Consecutive external-service failures before alerting.
    #[serde(default = "default_alert_after_failures")]
    pub alert_after_failures: u32,
}

/// Funding wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Address the payouts are funded from.
    pub funding_address: String,
    /// Environment variable holding the signing key.
    #[serde(default = "default_signing_key_env")]
    pub signing_key_env: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Indexer fixture file. Empty = `$data_dir/fixture.json`.
    #[serde(default)]
    pub fixture_file: String,
}

/// Block explorer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Base URL; receipts link to `{base_url}/tx/{tx_id}`.
    #[serde(default)]
    pub base_url: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_poll_interval() -> u64 {
    60
}

fn default_coinbase_maturity() -> u32 {
    DEFAULT_COINBASE_MATURITY
}

fn default_call_timeout() -> u64 {
    30
}

fn default_alert_after_failures() -> u32 {
    5
}

fn default_signing_key_env() -> String {
    "PAYOUT_SIGNING_KEY".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!("cannot read config {}: {e}", config_path.display())
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.engine.poll_interval_secs == 0 {
            anyhow::bail!("engine.poll_interval_secs must be positive");
        }
        if self.engine.call_timeout_secs == 0 {
            anyhow::bail!("engine.call_timeout_secs must be positive");
        }
        if self.wallet.funding_address.trim().is_empty() {
            anyhow::bail!("wallet.funding_address must be set");
        }
        Ok(())
    }

    /// Tick period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.engine.poll_interval_secs)
    }

    /// Engine settings derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::new(
            self.engine.balance_threshold,
            self.engine.base_unit,
            self.engine.per_output_fee_rate,
        );
        settings.selection = SelectionPolicy {
            coinbase_maturity: self.engine.coinbase_maturity,
        };
        settings.call_timeout = Duration::from_secs(self.engine.call_timeout_secs);
        settings.explorer_base_url = self.explorer.base_url.clone();
        settings
    }

    /// Secrets from the process environment.
    pub fn secrets(&self) -> Secrets {
        self.secrets_from(|name| std::env::var(name).ok())
    }

    /// Secrets with the signing key looked up through `lookup`.
    pub fn secrets_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Secrets {
        Secrets {
            signing_key: lookup(&self.wallet.signing_key_env).map(SigningKey::new),
            funding_address: Some(Address::new(self.wallet.funding_address.trim())),
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the indexer fixture path.
    pub fn fixture_path(&self) -> PathBuf {
        if self.storage.fixture_file.is_empty() {
            self.data_dir().join("fixture.json")
        } else {
            PathBuf::from(&self.storage.fixture_file)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        default_data_dir().join("config.toml")
    }
}

/// Platform-specific default data directory.
fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "macos")]
    {
        dirs_fallback("Library/Application Support/Payout")
    }
    #[cfg(target_os = "windows")]
    {
        dirs_fallback("Payout")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        dirs_fallback(".payout")
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/payout"))
}
