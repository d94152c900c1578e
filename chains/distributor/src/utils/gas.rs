use crate::chain::ChainClient;
use crate::contracts::ContractCall;
use crate::error::EstimationError;
use core_logic::{FeeTier, GasConfig, TierFees};
use ethers::types::U256;
use tracing::{debug, warn};

/// What to do when `eth_estimateGas` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMode {
    /// Use the configured fallback gas limit.
    Fallback,
    /// Surface the failure to the caller.
    Mandatory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSource {
    Estimated { raw: U256 },
    Fallback,
}

/// Gas limit and EIP-1559 fee pair for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeQuote {
    pub gas_limit: U256,
    pub priority_fee: U256,
    pub max_fee: U256,
    pub source: QuoteSource,
}

impl FeeQuote {
    /// Priority fee is clamped so it never exceeds the fee cap.
    pub fn new(gas_limit: U256, fees: TierFees, source: QuoteSource) -> Self {
        let max_fee = U256::from(fees.max_wei());
        let priority_fee = U256::from(fees.priority_wei()).min(max_fee);
        Self {
            gas_limit,
            priority_fee,
            max_fee,
            source,
        }
    }

    /// Upper bound on what the attempt can cost in wei.
    pub fn max_cost(&self) -> U256 {
        self.gas_limit.saturating_mul(self.max_fee)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, QuoteSource::Fallback)
    }
}

#[derive(Clone, Debug)]
pub struct FeeEstimator {
    config: GasConfig,
}

impl FeeEstimator {
    pub fn new(config: GasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GasConfig {
        &self.config
    }

    /// One estimation round trip from the client's own sender. Fees always
    /// come from the tier table.
    pub async fn estimate(
        &self,
        client: &dyn ChainClient,
        call: &ContractCall,
        tier: FeeTier,
        mode: EstimationMode,
    ) -> Result<FeeQuote, EstimationError> {
        let fees = self.config.fees(tier);

        match client.estimate_gas(call).await {
            Ok(raw) => {
                let limit = self.config.apply_margin(saturating_u64(raw));
                debug!(
                    "{} estimated at {} gas, limit {} ({} tier)",
                    call.method, raw, limit, tier
                );
                Ok(FeeQuote::new(
                    U256::from(limit),
                    fees,
                    QuoteSource::Estimated { raw },
                ))
            }
            Err(e) => match mode {
                EstimationMode::Fallback => {
                    warn!(
                        "{} estimation failed ({}), using fallback gas limit {}",
                        call.method, e, self.config.fallback_gas_limit
                    );
                    Ok(FeeQuote::new(
                        U256::from(self.config.fallback_gas_limit),
                        fees,
                        QuoteSource::Fallback,
                    ))
                }
                EstimationMode::Mandatory => Err(EstimationError {
                    method: call.method.to_string(),
                    reason: e.to_string(),
                }),
            },
        }
    }
}

pub(crate) fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_clamps_priority_to_max() {
        let quote = FeeQuote::new(U256::from(21_000u64), TierFees::new(5.0, 2.0), QuoteSource::Fallback);
        assert_eq!(quote.priority_fee, quote.max_fee);
        assert_eq!(quote.max_fee, U256::from(2_000_000_000u64));
    }

    #[test]
    fn test_max_cost() {
        let quote = FeeQuote::new(
            U256::from(100_000u64),
            FeeTier::Fast.default_fees(),
            QuoteSource::Fallback,
        );
        assert_eq!(
            quote.max_cost(),
            U256::from(100_000u64) * U256::from(60_000_000_000u64)
        );
        assert!(quote.is_fallback());
    }

    #[test]
    fn test_saturating_u64() {
        assert_eq!(saturating_u64(U256::from(42u64)), 42);
        assert_eq!(saturating_u64(U256::MAX), u64::MAX);
    }
}
