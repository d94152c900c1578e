//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod gas;
pub(crate) mod logger;
pub(crate) mod retry;
pub(crate) mod run_log;
pub(crate) mod runner;
pub(crate) mod wallet_store;

// Selective exports - only public utilities
pub use gas::{gwei_to_wei, FeeTier, GasConfig, GasConfigToml, TierFees};
pub use logger::{setup_logger, BATCH_RESULT_TARGET};
pub use run_log::{CsvLog, FileSink, LogSink, MemorySink};
pub use runner::WorkerRunner;
pub use wallet_store::{WalletRecord, WalletStore};
