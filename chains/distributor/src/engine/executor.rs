use crate::chain::ChainClient;
use crate::contracts::ContractCall;
use crate::error::ChainError;
use crate::utils::gas::FeeQuote;
use crate::utils::nonce_manager::SimpleNonceManager;
use core_logic::AttemptKind;
use ethers::types::{Address, H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Classified result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success {
        tx_hash: H256,
        gas_used: U256,
    },
    /// The node refused it, or it was mined with status 0.
    Reverted {
        reason: String,
        tx_hash: Option<H256>,
    },
    /// Nothing conclusive: the wait errored, timed out or the tx vanished.
    Failed {
        cause: String,
        tx_hash: Option<H256>,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "SUCCESS",
            ExecutionOutcome::Reverted { .. } => "REVERTED",
            ExecutionOutcome::Failed { .. } => "FAILED",
        }
    }

    pub fn kind(&self) -> AttemptKind {
        match self {
            ExecutionOutcome::Success { .. } => AttemptKind::Success,
            ExecutionOutcome::Reverted { .. } => AttemptKind::Reverted,
            ExecutionOutcome::Failed { .. } => AttemptKind::Failed,
        }
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            ExecutionOutcome::Success { tx_hash, .. } => Some(*tx_hash),
            ExecutionOutcome::Reverted { tx_hash, .. } | ExecutionOutcome::Failed { tx_hash, .. } => {
                *tx_hash
            }
        }
    }

    pub fn gas_used(&self) -> Option<U256> {
        match self {
            ExecutionOutcome::Success { gas_used, .. } => Some(*gas_used),
            _ => None,
        }
    }

    /// Revert reason or failure cause; empty on success.
    pub fn detail(&self) -> &str {
        match self {
            ExecutionOutcome::Success { .. } => "",
            ExecutionOutcome::Reverted { reason, .. } => reason,
            ExecutionOutcome::Failed { cause, .. } => cause,
        }
    }
}

/// Submits one transaction and waits it out. Never retries a submission.
#[derive(Clone)]
pub struct TransactionExecutor {
    client: Arc<dyn ChainClient>,
    nonces: SimpleNonceManager,
    confirmation_timeout: Duration,
}

impl TransactionExecutor {
    pub fn new(client: Arc<dyn ChainClient>, confirmation_timeout: Duration) -> Self {
        Self {
            nonces: SimpleNonceManager::new(client.clone()),
            client,
            confirmation_timeout,
        }
    }

    pub fn sender(&self) -> Address {
        self.client.sender()
    }

    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    pub async fn submit_and_confirm(&self, call: &ContractCall, quote: &FeeQuote) -> ExecutionOutcome {
        let outcome = self.attempt(call, quote).await;
        if !outcome.is_success() {
            if let Err(e) = self.nonces.resync().await {
                warn!("Nonce resync for {:?} failed: {}", self.sender(), e);
            }
        }
        outcome
    }

    async fn attempt(&self, call: &ContractCall, quote: &FeeQuote) -> ExecutionOutcome {
        let nonce = match self.nonces.next().await {
            Ok(nonce) => nonce,
            Err(e) => {
                return ExecutionOutcome::Failed {
                    cause: format!("nonce lookup failed: {}", e),
                    tx_hash: None,
                }
            }
        };

        let tx_hash = match self.client.submit(call, quote, nonce).await {
            Ok(hash) => hash,
            Err(ChainError::Rejected(reason)) => {
                return ExecutionOutcome::Reverted {
                    reason,
                    tx_hash: None,
                }
            }
            Err(e) => {
                return ExecutionOutcome::Failed {
                    cause: e.to_string(),
                    tx_hash: None,
                }
            }
        };

        let receipt = match tokio::time::timeout(
            self.confirmation_timeout,
            self.client.wait_for_receipt(tx_hash),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                return ExecutionOutcome::Failed {
                    cause: e.to_string(),
                    tx_hash: Some(tx_hash),
                }
            }
            Err(_) => {
                return ExecutionOutcome::Failed {
                    cause: format!(
                        "no receipt within {}s",
                        self.confirmation_timeout.as_secs_f64()
                    ),
                    tx_hash: Some(tx_hash),
                }
            }
        };

        if receipt.success {
            debug!(
                "{} confirmed in block {:?}, gas used {}",
                call.method, receipt.block_number, receipt.gas_used
            );
            ExecutionOutcome::Success {
                tx_hash: receipt.tx_hash,
                gas_used: receipt.gas_used,
            }
        } else {
            let reason = self
                .client
                .revert_reason(call, receipt.block_number)
                .await
                .unwrap_or_default();
            ExecutionOutcome::Reverted {
                reason,
                tx_hash: Some(receipt.tx_hash),
            }
        }
    }
}
