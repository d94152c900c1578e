//! Error types for the distribution engine.
//!
//! Fatal conditions (`InsufficientWallets`, `ApprovalFailed`,
//! `AllowanceExhausted`, store corruption, configuration, log writes) abort a
//! run. Per-batch transaction faults are
//! never errors: they are `ExecutionOutcome`s recorded in the run log.

use core_logic::{ConfigError, StoreError};
use ethers::types::{Address, H256, U256};
use thiserror::Error;

/// Failures at the node boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    #[error("Transaction {0:?} was dropped from the mempool")]
    Dropped(H256),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Gas estimation failure carrying the node's reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Gas estimation failed for {method}: {reason}")]
pub struct EstimationError {
    pub method: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum DistributorError {
    #[error("Batch needs {requested} wallets but only {available} are available")]
    InsufficientWallets { requested: usize, available: usize },

    #[error("Approval failed: {reason}")]
    ApprovalFailed { reason: String },

    #[error(
        "Batch #{batch_index} reverted and the allowance of {allowance} cannot cover the remaining {required}"
    )]
    AllowanceExhausted {
        batch_index: usize,
        allowance: U256,
        required: U256,
    },

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error("Faucet is owned by {owner:?}, not by the configured admin {admin:?}")]
    NotFaucetOwner { owner: Address, admin: Address },

    #[error("{recipients} recipients but {amounts} amounts")]
    LengthMismatch { recipients: usize, amounts: usize },

    #[error("Sender queue for {0:?} is closed")]
    QueueClosed(Address),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Run log write failed: {0}")]
    Log(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DistributorError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        DistributorError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        })
    }
}
