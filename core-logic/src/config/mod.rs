use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network endpoint settings shared by every chain crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(ConfigError::InvalidRpcUrl {
                url: self.rpc_url.clone(),
            });
        }
        Ok(())
    }
}

/// Where the recipient wallets live and how many a run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStoreConfig {
    pub path: String,
    #[serde(default)]
    pub count: Option<usize>,
}

/// How long and how often to wait for a submitted transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_confirmations() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            confirmations: default_confirmations(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConfirmationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "confirmation.confirmations".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "confirmation.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
