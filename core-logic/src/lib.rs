//! # Core Logic - Shared Utilities for Token Distribution
//!
//! Chain-agnostic building blocks used by the distributor crate: logging,
//! typed errors, fee tier configuration, the wallet store, append-only run
//! log sinks, read retries and the concurrent workload runner.
//!
//! ## Modules
//!
//! - [`config`] - Endpoint, wallet store and confirmation settings
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Batch outcome and gas counters
//! - [`traits`] - Wallet generation and workload seams
//! - [`utils`] - Logger, gas tiers, wallet store, run log, retry, runner

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub(crate) mod utils;

pub use config::{ChainConfig, ConfirmationConfig, WalletStoreConfig};
pub use error::{ConfigError, CoreError, StoreError};
pub use metrics::{AttemptKind, MetricsCollector, MetricsSnapshot};
pub use traits::{WalletGenerator, Workload};

pub use utils::{
    gwei_to_wei, setup_logger, CsvLog, FeeTier, FileSink, GasConfig, GasConfigToml, LogSink,
    MemorySink, TierFees, WalletRecord, WalletStore, WorkerRunner, BATCH_RESULT_TARGET,
};

// Export retry utilities for the chain crates and tests
pub use utils::retry::{is_transient_error, with_retry, RetryConfig};
