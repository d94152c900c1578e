//! Batch token distribution over an EVM multi-sender, plus the faucet
//! whitelist and claim cycle.

pub mod app;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod utils;

pub use app::{App, WalletSet};
pub use error::{ChainError, DistributorError, EstimationError};
