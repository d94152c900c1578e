use crate::utils::wallet_store::WalletRecord;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Source of fresh wallet records for the wallet store.
pub trait WalletGenerator {
    fn generate(&mut self) -> WalletRecord;
}

/// A long-running unit of work driven by the worker runner
/// (a distribution run, a scan, a faucet cycle).
#[async_trait]
pub trait Workload: Send + Sync {
    type Report: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the label used in logs and run-log rows
    fn name(&self) -> &str;

    /// Runs to completion or until `cancel` fires between batches.
    async fn run(&self, cancel: CancellationToken) -> Result<Self::Report, Self::Error>;
}
