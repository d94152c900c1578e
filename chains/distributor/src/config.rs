use config::{Config, Environment, File};
use core_logic::{
    ChainConfig, ConfigError, ConfirmationConfig, FeeTier, GasConfig, GasConfigToml,
    WalletStoreConfig,
};
use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use serde::Deserialize;
use std::env;
use url::Url;
use zeroize::Zeroizing;

/// Prefix for environment overrides, e.g. `DISTRIBUTOR__CHAIN__RPC_URL`.
pub const ENV_PREFIX: &str = "DISTRIBUTOR";

#[derive(Debug, Deserialize, Clone)]
pub struct DistributorConfig {
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    pub wallets: WalletStoreConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub gas: GasConfigToml,
    #[serde(default)]
    pub distribute: DistributeConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub faucet: FaucetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContractsConfig {
    pub token: Address,
    pub multi_sender: Address,
    #[serde(default)]
    pub faucet: Option<Address>,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
}

fn default_token_decimals() -> u32 {
    18
}

/// Fixed-list distribution.
#[derive(Debug, Deserialize, Clone)]
pub struct DistributeConfig {
    #[serde(default = "default_sizes")]
    pub sizes: Vec<usize>,
    #[serde(default = "default_distribute_amount")]
    pub amount: String,
    #[serde(default = "default_approval_amount")]
    pub approval_amount: String,
    #[serde(default = "default_distribute_tier")]
    pub tier: FeeTier,
    #[serde(default = "default_distribute_log")]
    pub log_path: String,
}

fn default_sizes() -> Vec<usize> {
    (1..=10).map(|i| i * 100).collect()
}

fn default_distribute_amount() -> String {
    "1".to_string()
}

fn default_approval_amount() -> String {
    "1000000".to_string()
}

fn default_distribute_tier() -> FeeTier {
    FeeTier::Fast
}

fn default_distribute_log() -> String {
    "distribution_log.csv".to_string()
}

impl Default for DistributeConfig {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            amount: default_distribute_amount(),
            approval_amount: default_approval_amount(),
            tier: default_distribute_tier(),
            log_path: default_distribute_log(),
        }
    }
}

/// Adaptive scan.
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_scan_initial")]
    pub initial: usize,
    #[serde(default = "default_scan_step")]
    pub step: usize,
    #[serde(default = "default_scan_amount")]
    pub amount: String,
    #[serde(default = "default_scan_tier")]
    pub tier: FeeTier,
    #[serde(default = "default_scan_log")]
    pub log_path: String,
}

fn default_scan_initial() -> usize {
    100
}

fn default_scan_step() -> usize {
    100
}

fn default_scan_amount() -> String {
    "0.001".to_string()
}

fn default_scan_tier() -> FeeTier {
    FeeTier::Normal
}

fn default_scan_log() -> String {
    "scan_log.csv".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            initial: default_scan_initial(),
            step: default_scan_step(),
            amount: default_scan_amount(),
            tier: default_scan_tier(),
            log_path: default_scan_log(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FaucetConfig {
    #[serde(default = "default_faucet_batch")]
    pub batch_size: usize,
    #[serde(default = "default_claimable_amount")]
    pub claimable_amount: String,
    /// Native currency sent to each test wallet, in ether.
    #[serde(default = "default_native_funding")]
    pub native_funding: String,
    #[serde(default = "default_admin_tier")]
    pub admin_tier: FeeTier,
    #[serde(default = "default_funding_tier")]
    pub funding_tier: FeeTier,
    #[serde(default = "default_claim_tier")]
    pub claim_tier: FeeTier,
    #[serde(default = "default_faucet_log")]
    pub log_path: String,
}

fn default_faucet_batch() -> usize {
    1000
}

fn default_claimable_amount() -> String {
    "0.1".to_string()
}

fn default_native_funding() -> String {
    "0.01".to_string()
}

fn default_admin_tier() -> FeeTier {
    FeeTier::Normal
}

fn default_funding_tier() -> FeeTier {
    FeeTier::Low
}

fn default_claim_tier() -> FeeTier {
    FeeTier::Normal
}

fn default_faucet_log() -> String {
    "faucet_log.csv".to_string()
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            batch_size: default_faucet_batch(),
            claimable_amount: default_claimable_amount(),
            native_funding: default_native_funding(),
            admin_tier: default_admin_tier(),
            funding_tier: default_funding_tier(),
            claim_tier: default_claim_tier(),
            log_path: default_faucet_log(),
        }
    }
}

impl DistributorConfig {
    /// Reads the TOML file, then applies `DISTRIBUTOR__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| load_error(path, e))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| load_error(path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        Url::parse(&self.chain.rpc_url).map_err(|_| ConfigError::InvalidRpcUrl {
            url: self.chain.rpc_url.clone(),
        })?;
        self.confirmation.validate()?;
        self.gas_config().validate()?;

        if self.distribute.sizes.contains(&0) {
            return Err(invalid("distribute.sizes", "batch sizes must be positive"));
        }
        if self.scan.initial == 0 {
            return Err(invalid("scan.initial", "must be positive"));
        }
        if self.scan.step == 0 {
            return Err(invalid("scan.step", "must be positive"));
        }
        if self.faucet.batch_size == 0 {
            return Err(invalid("faucet.batch_size", "must be positive"));
        }

        self.distribute_amount()?;
        self.approval_amount()?;
        self.scan_amount()?;
        self.claimable_amount()?;
        self.native_funding()?;
        Ok(())
    }

    pub fn gas_config(&self) -> GasConfig {
        self.gas.clone().into()
    }

    pub fn distribute_amount(&self) -> Result<U256, ConfigError> {
        self.token_amount("distribute.amount", &self.distribute.amount)
    }

    pub fn approval_amount(&self) -> Result<U256, ConfigError> {
        self.token_amount("distribute.approval_amount", &self.distribute.approval_amount)
    }

    pub fn scan_amount(&self) -> Result<U256, ConfigError> {
        self.token_amount("scan.amount", &self.scan.amount)
    }

    pub fn claimable_amount(&self) -> Result<U256, ConfigError> {
        self.token_amount("faucet.claimable_amount", &self.faucet.claimable_amount)
    }

    pub fn native_funding(&self) -> Result<U256, ConfigError> {
        parse_token_amount("faucet.native_funding", &self.faucet.native_funding, 18)
    }

    pub fn faucet_address(&self) -> Result<Address, ConfigError> {
        self.contracts.faucet.ok_or_else(|| ConfigError::MissingField {
            field: "contracts.faucet".to_string(),
        })
    }

    fn token_amount(&self, field: &str, value: &str) -> Result<U256, ConfigError> {
        parse_token_amount(field, value, self.contracts.token_decimals)
    }
}

/// Scales a decimal string such as `"0.1"` by `decimals`.
pub fn parse_token_amount(field: &str, value: &str, decimals: u32) -> Result<U256, ConfigError> {
    let units = parse_units(value.trim(), decimals).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("{:?} is not a valid amount: {}", value, e),
    })?;
    Ok(U256::from(units))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn load_error(path: &str, e: config::ConfigError) -> ConfigError {
    ConfigError::Load {
        path: path.to_string(),
        msg: e.to_string(),
    }
}

/// Signing keys read from the environment (after `dotenv`).
pub struct Secrets {
    pub private_key: Zeroizing<String>,
    pub faucet_admin_key: Option<Zeroizing<String>>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        let private_key = env::var("PRIVATE_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "PRIVATE_KEY".to_string(),
            })?;
        let faucet_admin_key = env::var("FAUCET_ADMIN_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Zeroizing::new);

        Ok(Self {
            private_key: Zeroizing::new(private_key),
            faucet_admin_key,
        })
    }

    /// Key that administers the faucet; the distribution key when unset.
    pub fn admin_key(&self) -> &str {
        self.faucet_admin_key
            .as_deref()
            .map(String::as_str)
            .unwrap_or(self.private_key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[chain]
rpc_url = "https://rpc.example.org"
chain_id = 11155111

[contracts]
token = "0x1111111111111111111111111111111111111111"
multi_sender = "0x2222222222222222222222222222222222222222"
token_decimals = 6

[wallets]
path = "wallets.json"
count = 500

[distribute]
sizes = [100, 200]

[gas]
margin_percent = 30
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_applies_defaults() {
        let file = write_config(SAMPLE);
        let config = DistributorConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.chain.chain_id, 11155111);
        assert_eq!(config.distribute.sizes, vec![100, 200]);
        assert_eq!(config.distribute.tier, FeeTier::Fast);
        assert_eq!(config.scan.initial, 100);
        assert_eq!(config.scan.tier, FeeTier::Normal);
        assert_eq!(config.faucet.batch_size, 1000);
        assert_eq!(config.confirmation.confirmations, 1);
        assert_eq!(config.gas_config().margin_percent, 30);
        assert_eq!(config.gas_config().fallback_gas_limit, 200_000);
        assert!(config.contracts.faucet.is_none());
        assert!(config.faucet_address().is_err());
    }

    #[test]
    fn test_amounts_scale_by_decimals() {
        let file = write_config(SAMPLE);
        let config = DistributorConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.distribute_amount().unwrap(), U256::from(1_000_000u64));
        assert_eq!(
            config.approval_amount().unwrap(),
            U256::from(1_000_000u64) * U256::from(1_000_000u64)
        );
        assert_eq!(config.claimable_amount().unwrap(), U256::from(100_000u64));
        assert_eq!(
            config.native_funding().unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_parse_token_amount_rejects_garbage() {
        assert!(parse_token_amount("x", "abc", 18).is_err());
        assert_eq!(
            parse_token_amount("x", "0.001", 18).unwrap(),
            U256::from(1_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let file = write_config(&SAMPLE.replace("[100, 200]", "[100, 0]"));
        let err = DistributorConfig::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "distribute.sizes"));
    }

    #[test]
    fn test_bad_rpc_url_is_rejected() {
        let file = write_config(&SAMPLE.replace("https://rpc.example.org", "rpc.example.org"));
        let err = DistributorConfig::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRpcUrl { .. }));
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = DistributorConfig::load("/nonexistent/distributor.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
