use super::{ChainClient, ClientFactory, ReceiptInfo};
use crate::contracts::ContractCall;
use crate::error::{ChainError, DistributorError};
use crate::utils::gas::FeeQuote;
use crate::utils::keys::wallet_from_record;
use async_trait::async_trait;
use core_logic::{ConfirmationConfig, WalletRecord};
use ethers::abi::ParamType;
use ethers::prelude::*;
use ethers::providers::{PendingTransaction, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Builds the HTTP provider with bounded request and connect timeouts.
pub fn connect(rpc_url: &str) -> Result<Provider<Http>, DistributorError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| DistributorError::config("chain.rpc_url", e.to_string()))?;

    let url = reqwest::Url::parse(rpc_url)
        .map_err(|e| DistributorError::config("chain.rpc_url", e.to_string()))?;

    Ok(Provider::new(Http::new_with_client(url, client)))
}

/// [`ChainClient`] backed by an ethers HTTP provider and a local signer.
#[derive(Clone, Debug)]
pub struct EthersChainClient {
    provider: Arc<Provider<Http>>,
    wallet: LocalWallet,
    chain_id: u64,
    confirmations: usize,
    poll_interval: Duration,
}

impl EthersChainClient {
    pub fn new(
        provider: Arc<Provider<Http>>,
        wallet: LocalWallet,
        chain_id: u64,
        confirmation: &ConfirmationConfig,
    ) -> Self {
        Self {
            provider,
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
            confirmations: confirmation.confirmations,
            poll_interval: confirmation.poll_interval(),
        }
    }

    fn call_request(&self, call: &ContractCall) -> TypedTransaction {
        Eip1559TransactionRequest::new()
            .from(self.wallet.address())
            .to(call.to)
            .data(call.data.clone())
            .value(call.value)
            .chain_id(self.chain_id)
            .into()
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn sender(&self) -> Address {
        self.wallet.address()
    }

    async fn read(&self, call: &ContractCall) -> Result<Bytes, ChainError> {
        self.provider
            .call(&self.call_request(call), None)
            .await
            .map_err(|e| ChainError::Rpc(describe(&e)))
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<U256, ChainError> {
        self.provider
            .estimate_gas(&self.call_request(call), None)
            .await
            .map_err(|e| ChainError::Rpc(revert_message(&e)))
    }

    async fn pending_nonce(&self) -> Result<U256, ChainError> {
        self.provider
            .get_transaction_count(self.wallet.address(), Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ChainError::Rpc(describe(&e)))
    }

    async fn submit(
        &self,
        call: &ContractCall,
        quote: &FeeQuote,
        nonce: U256,
    ) -> Result<H256, ChainError> {
        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .from(self.wallet.address())
            .to(call.to)
            .data(call.data.clone())
            .value(call.value)
            .gas(quote.gas_limit)
            .max_fee_per_gas(quote.max_fee)
            .max_priority_fee_per_gas(quote.priority_fee)
            .nonce(nonce)
            .chain_id(self.chain_id)
            .into();

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| ChainError::Rejected(format!("signing failed: {}", e)))?;
        let raw = tx.rlp_signed(&signature);

        match self.provider.send_raw_transaction(raw).await {
            Ok(pending) => {
                debug!("{} submitted as {:?} (nonce {})", call.method, pending.tx_hash(), nonce);
                Ok(pending.tx_hash())
            }
            // A JSON-RPC error body means the node looked at it and said no.
            Err(e) if RpcError::as_error_response(&e).is_some() => Err(ChainError::Rejected(describe(&e))),
            Err(e) => Err(ChainError::Rpc(describe(&e))),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptInfo, ChainError> {
        let pending = PendingTransaction::new(tx_hash, self.provider.as_ref())
            .interval(self.poll_interval)
            .confirmations(self.confirmations);

        match pending.await {
            Ok(Some(receipt)) => Ok(ReceiptInfo {
                tx_hash: receipt.transaction_hash,
                gas_used: receipt.gas_used.unwrap_or_default(),
                success: receipt.status == Some(U64::from(1)),
                block_number: receipt.block_number,
            }),
            Ok(None) => Err(ChainError::Dropped(tx_hash)),
            Err(e) => Err(ChainError::Rpc(describe(&e))),
        }
    }

    async fn revert_reason(&self, call: &ContractCall, block: Option<U64>) -> Option<String> {
        match self
            .provider
            .call(&self.call_request(call), replay_block(block))
            .await
        {
            Ok(_) => None,
            Err(e) => Some(revert_message(&e)),
        }
    }
}

/// Creates signer-specific clients that share one provider.
pub struct EthersClientFactory {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
    confirmation: ConfirmationConfig,
}

impl EthersClientFactory {
    pub fn new(provider: Arc<Provider<Http>>, chain_id: u64, confirmation: ConfirmationConfig) -> Self {
        Self {
            provider,
            chain_id,
            confirmation,
        }
    }

    pub fn client_for_wallet(&self, wallet: LocalWallet) -> Arc<dyn ChainClient> {
        Arc::new(EthersChainClient::new(
            self.provider.clone(),
            wallet,
            self.chain_id,
            &self.confirmation,
        ))
    }
}

impl ClientFactory for EthersClientFactory {
    fn client_for(&self, record: &WalletRecord) -> Result<Arc<dyn ChainClient>, DistributorError> {
        Ok(self.client_for_wallet(wallet_from_record(record)?))
    }
}

/// Parent of the inclusion block, so the replay sees the pre-transaction state.
fn replay_block(inclusion: Option<U64>) -> Option<BlockId> {
    inclusion.map(|n| BlockId::Number(BlockNumber::Number(n.saturating_sub(U64::one()))))
}

fn describe(err: &ProviderError) -> String {
    match RpcError::as_error_response(err) {
        Some(resp) => resp.message.clone(),
        None => err.to_string(),
    }
}

/// Prefers the decoded `Error(string)` payload over the node's message.
fn revert_message(err: &ProviderError) -> String {
    RpcError::as_error_response(err)
        .and_then(|resp| resp.as_revert_data())
        .and_then(|data| decode_error_string(&data))
        .unwrap_or_else(|| describe(err))
}

pub(crate) fn decode_error_string(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    let tokens = ethers::abi::decode(&[ParamType::String], payload).ok()?;
    tokens.into_iter().next()?.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::Token;

    #[test]
    fn test_decode_error_string_payload() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(ethers::abi::encode(&[Token::String(
            "Arrays length mismatch".to_string(),
        )]));
        assert_eq!(
            decode_error_string(&data).as_deref(),
            Some("Arrays length mismatch")
        );
    }

    #[test]
    fn test_non_error_payload_is_ignored() {
        assert_eq!(decode_error_string(&[0xde, 0xad, 0xbe, 0xef, 0, 0]), None);
        assert_eq!(decode_error_string(&[]), None);
    }

    #[test]
    fn test_replay_targets_parent_block() {
        assert_eq!(
            replay_block(Some(U64::from(120))),
            Some(BlockId::Number(BlockNumber::Number(U64::from(119))))
        );
        assert_eq!(
            replay_block(Some(U64::zero())),
            Some(BlockId::Number(BlockNumber::Number(U64::zero())))
        );
        assert_eq!(replay_block(None), None);
    }

    #[test]
    fn test_connect_rejects_garbage_url() {
        assert!(connect("not a url").is_err());
        assert!(connect("http://127.0.0.1:8545").is_ok());
    }
}
