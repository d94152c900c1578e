use super::executor::ExecutionOutcome;
use super::sender_queue::SenderQueue;
use crate::chain::read_u256;
use crate::contracts::ContractCall;
use crate::error::DistributorError;
use crate::utils::gas::{EstimationMode, FeeEstimator};
use core_logic::{FeeTier, RetryConfig};
use ethers::types::{Address, U256};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceState {
    pub owner: Address,
    pub spender: Address,
    pub current_allowance: U256,
}

/// Gate that runs once before any transfer batch.
pub struct AllowanceManager {
    queue: SenderQueue,
    estimator: FeeEstimator,
    tier: FeeTier,
    retry: RetryConfig,
}

impl AllowanceManager {
    pub fn new(queue: SenderQueue, estimator: FeeEstimator, tier: FeeTier) -> Self {
        Self {
            queue,
            estimator,
            tier,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn current(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, DistributorError> {
        let client = self.queue.client();
        let call = ContractCall::allowance(token, owner, spender);
        Ok(read_u256(client.as_ref(), &call, self.retry).await?)
    }

    /// Approves exactly `required` when the current allowance is short.
    pub async fn ensure_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> Result<AllowanceState, DistributorError> {
        if owner != self.queue.sender() {
            return Err(DistributorError::config(
                "allowance.owner",
                format!(
                    "owner {:?} is not the submitting account {:?}",
                    owner,
                    self.queue.sender()
                ),
            ));
        }

        let current = self.current(token, owner, spender).await?;
        if current >= required {
            info!(
                "Allowance {} for {:?} already covers {}",
                current, spender, required
            );
            return Ok(AllowanceState {
                owner,
                spender,
                current_allowance: current,
            });
        }

        info!(
            "Allowance {} < {}, approving {:?} for {}",
            current, required, spender, required
        );
        let call = ContractCall::approve(token, spender, required);
        let client = self.queue.client();
        let quote = self
            .estimator
            .estimate(client.as_ref(), &call, self.tier, EstimationMode::Fallback)
            .await?;

        match self.queue.execute(call, quote).await? {
            ExecutionOutcome::Success { tx_hash, .. } => {
                info!("Approval confirmed: {:?}", tx_hash);
            }
            other => {
                warn!("Approval {}: {}", other.label(), other.detail());
                return Err(DistributorError::ApprovalFailed {
                    reason: format!("approve {}: {}", other.label(), other.detail()),
                });
            }
        }

        let updated = self.current(token, owner, spender).await?;
        if updated < required {
            return Err(DistributorError::ApprovalFailed {
                reason: format!(
                    "allowance is {} after approval, {} required",
                    updated, required
                ),
            });
        }

        Ok(AllowanceState {
            owner,
            spender,
            current_allowance: updated,
        })
    }
}
