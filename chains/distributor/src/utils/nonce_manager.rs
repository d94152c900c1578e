use crate::chain::{pending_nonce_with_retry, ChainClient};
use crate::error::ChainError;
use core_logic::RetryConfig;
use ethers::types::U256;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct SimpleNonceManager {
    client: Arc<dyn ChainClient>,
    current_nonce: Arc<Mutex<Option<U256>>>,
    retry: RetryConfig,
}

impl SimpleNonceManager {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            current_nonce: Arc::new(Mutex::new(None)),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get the next nonce to use.
    /// If initialized, returns the local counter and increments it.
    /// If not, fetches from pending state.
    pub async fn next(&self) -> Result<U256, ChainError> {
        let mut nonce_guard = self.current_nonce.lock().await;

        let nonce = match *nonce_guard {
            Some(nonce) => nonce,
            None => pending_nonce_with_retry(self.client.as_ref(), self.retry).await?,
        };
        *nonce_guard = Some(nonce + 1);
        Ok(nonce)
    }

    /// Reset the local nonce to the on-chain value (after any non-success)
    pub async fn resync(&self) -> Result<(), ChainError> {
        let mut nonce_guard = self.current_nonce.lock().await;
        let nonce = pending_nonce_with_retry(self.client.as_ref(), self.retry).await?;
        *nonce_guard = Some(nonce);
        Ok(())
    }
}
