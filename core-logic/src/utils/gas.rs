//! # Core Logic - Gas Configuration
//!
//! Fee tiers, safety margin and fallback gas limit shared by chain crates.
//! This module provides configuration only; the chain crate performs the
//! actual estimation call and builds the fee quote.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Urgency tier used to pick a fixed priority/max fee pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Low,
    Normal,
    Fast,
    Urgent,
}

impl FeeTier {
    pub const ALL: [FeeTier; 4] = [FeeTier::Low, FeeTier::Normal, FeeTier::Fast, FeeTier::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeTier::Low => "low",
            FeeTier::Normal => "normal",
            FeeTier::Fast => "fast",
            FeeTier::Urgent => "urgent",
        }
    }

    /// Built-in fee pair for the tier, in gwei.
    pub fn default_fees(&self) -> TierFees {
        match self {
            FeeTier::Low => TierFees::new(10.0, 40.0),
            FeeTier::Normal => TierFees::new(15.0, 50.0),
            FeeTier::Fast => TierFees::new(20.0, 60.0),
            FeeTier::Urgent => TierFees::new(25.0, 75.0),
        }
    }
}

impl std::fmt::Display for FeeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority fee (tip) and fee cap per gas unit, in gwei.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierFees {
    pub priority_gwei: f64,
    pub max_gwei: f64,
}

impl TierFees {
    pub fn new(priority_gwei: f64, max_gwei: f64) -> Self {
        Self {
            priority_gwei,
            max_gwei,
        }
    }

    pub fn priority_wei(&self) -> u128 {
        gwei_to_wei(self.priority_gwei)
    }

    pub fn max_wei(&self) -> u128 {
        gwei_to_wei(self.max_gwei)
    }
}

/// Configuration for fee quoting
#[derive(Debug, Clone, PartialEq)]
pub struct GasConfig {
    pub margin_percent: u64,
    pub fallback_gas_limit: u64,
    tiers: BTreeMap<FeeTier, TierFees>,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            margin_percent: 20,
            fallback_gas_limit: 200_000,
            tiers: FeeTier::ALL
                .iter()
                .map(|tier| (*tier, tier.default_fees()))
                .collect(),
        }
    }
}

impl GasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_margin_percent(mut self, margin_percent: u64) -> Self {
        self.margin_percent = margin_percent;
        self
    }

    pub fn with_fallback_gas_limit(mut self, limit: u64) -> Self {
        self.fallback_gas_limit = limit;
        self
    }

    pub fn with_tier(mut self, tier: FeeTier, fees: TierFees) -> Self {
        self.tiers.insert(tier, fees);
        self
    }

    pub fn fees(&self, tier: FeeTier) -> TierFees {
        self.tiers
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.default_fees())
    }

    /// Raw estimate plus the safety margin, rounded up.
    pub fn apply_margin(&self, raw: u64) -> u64 {
        let scaled = raw as u128 * (100 + self.margin_percent as u128);
        let limit = scaled.div_ceil(100);
        u64::try_from(limit).unwrap_or(u64::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_gas_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gas.fallback_gas_limit".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        for (tier, fees) in &self.tiers {
            let field = format!("gas.tiers.{}", tier);
            if !fees.priority_gwei.is_finite()
                || !fees.max_gwei.is_finite()
                || fees.priority_gwei < 0.0
                || fees.max_gwei < 0.0
            {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "fees must be finite and non-negative".to_string(),
                });
            }
            if fees.max_gwei < fees.priority_gwei {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!(
                        "max fee {} gwei is below priority fee {} gwei",
                        fees.max_gwei, fees.priority_gwei
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Convert gwei to wei
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * 1e9).round() as u128
}

/// Deserialize helper for GasConfig from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasConfigToml {
    pub margin_percent: Option<u64>,
    pub fallback_gas_limit: Option<u64>,
    #[serde(default)]
    pub tiers: BTreeMap<FeeTier, TierFees>,
}

impl From<GasConfigToml> for GasConfig {
    fn from(toml: GasConfigToml) -> Self {
        let mut config = GasConfig::default();
        if let Some(margin) = toml.margin_percent {
            config.margin_percent = margin;
        }
        if let Some(limit) = toml.fallback_gas_limit {
            config.fallback_gas_limit = limit;
        }
        for (tier, fees) in toml.tiers {
            config.tiers.insert(tier, fees);
        }
        config
    }
}
