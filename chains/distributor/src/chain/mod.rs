//! The node boundary. Everything the engine needs from the network goes
//! through [`ChainClient`], one instance per signing account.

pub mod ethers_client;

use crate::contracts::{decode_address, decode_u256, ContractCall};
use crate::error::{ChainError, DistributorError};
use crate::utils::gas::FeeQuote;
use async_trait::async_trait;
use core_logic::{with_retry, RetryConfig, WalletRecord};
use ethers::types::{Address, Bytes, H256, U256, U64};
use std::sync::Arc;

pub use ethers_client::{EthersChainClient, EthersClientFactory};

/// What the executor needs to know about a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub tx_hash: H256,
    pub gas_used: U256,
    pub success: bool,
    pub block_number: Option<U64>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account that signs everything submitted through this client.
    fn sender(&self) -> Address;

    /// `eth_call` from the sender at the latest block.
    async fn read(&self, call: &ContractCall) -> Result<Bytes, ChainError>;

    /// One `eth_estimateGas` round trip for the exact call.
    async fn estimate_gas(&self, call: &ContractCall) -> Result<U256, ChainError>;

    /// Transaction count including pending transactions.
    async fn pending_nonce(&self) -> Result<U256, ChainError>;

    /// Signs and broadcasts; returns as soon as the node accepts it.
    async fn submit(
        &self,
        call: &ContractCall,
        quote: &FeeQuote,
        nonce: U256,
    ) -> Result<H256, ChainError>;

    /// Resolves once the transaction has the configured confirmations.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptInfo, ChainError>;

    /// Best-effort revert string for a call that reverted in `block`, replayed
    /// against the state just before it.
    async fn revert_reason(&self, _call: &ContractCall, _block: Option<U64>) -> Option<String> {
        None
    }
}

/// Builds a client for an arbitrary wallet (faucet test accounts).
pub trait ClientFactory: Send + Sync {
    fn client_for(&self, record: &WalletRecord) -> Result<Arc<dyn ChainClient>, DistributorError>;
}

pub async fn read_u256(
    client: &dyn ChainClient,
    call: &ContractCall,
    retry: RetryConfig,
) -> Result<U256, ChainError> {
    let raw = retried_read(client, call, retry).await?;
    decode_u256(&raw)
}

pub async fn read_address(
    client: &dyn ChainClient,
    call: &ContractCall,
    retry: RetryConfig,
) -> Result<Address, ChainError> {
    let raw = retried_read(client, call, retry).await?;
    decode_address(&raw)
}

async fn retried_read(
    client: &dyn ChainClient,
    call: &ContractCall,
    retry: RetryConfig,
) -> Result<Bytes, ChainError> {
    with_retry(retry, call.method, || async move {
        client.read(call).await.map_err(anyhow::Error::from)
    })
    .await
    .map_err(|e| ChainError::Rpc(format!("{:#}", e)))
}

pub async fn pending_nonce_with_retry(
    client: &dyn ChainClient,
    retry: RetryConfig,
) -> Result<U256, ChainError> {
    with_retry(retry, "pending_nonce", || async move {
        client.pending_nonce().await.map_err(anyhow::Error::from)
    })
    .await
    .map_err(|e| ChainError::Rpc(format!("{:#}", e)))
}
