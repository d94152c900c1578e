use core_logic::{ConfigError, FeeTier, GasConfig, GasConfigToml, TierFees};
use std::collections::BTreeMap;

#[test]
fn test_toml_overrides_merge_over_defaults() {
    let mut tiers = BTreeMap::new();
    tiers.insert(FeeTier::Fast, TierFees::new(2.0, 8.0));
    let toml = GasConfigToml {
        margin_percent: Some(30),
        fallback_gas_limit: None,
        tiers,
    };

    let config = GasConfig::from(toml);

    assert_eq!(config.margin_percent, 30);
    assert_eq!(config.fallback_gas_limit, 200_000);
    assert_eq!(config.fees(FeeTier::Fast), TierFees::new(2.0, 8.0));
    assert_eq!(config.fees(FeeTier::Low), FeeTier::Low.default_fees());
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder_chain() {
    let config = GasConfig::new()
        .with_margin_percent(0)
        .with_fallback_gas_limit(500_000)
        .with_tier(FeeTier::Urgent, TierFees::new(1.0, 1.0));

    assert_eq!(config.apply_margin(21_000), 21_000);
    assert_eq!(config.fallback_gas_limit, 500_000);
    assert_eq!(config.fees(FeeTier::Urgent).max_wei(), 1_000_000_000);
}

#[test]
fn test_margin_is_rounded_up() {
    let config = GasConfig::default();
    assert_eq!(config.apply_margin(100_000), 120_000);
    assert_eq!(config.apply_margin(1), 2);
}

#[test]
fn test_zero_fallback_limit_is_rejected() {
    let config = GasConfig::new().with_fallback_gas_limit(0);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn test_tier_names_deserialize_lowercase() {
    let tier: FeeTier = serde_json::from_str("\"urgent\"").unwrap();
    assert_eq!(tier, FeeTier::Urgent);
    assert_eq!(FeeTier::Normal.to_string(), "normal");
}
