//! The batch-submission engine: planning, the allowance gate, per-sender
//! execution, the run log, and the workloads built on top of them.

pub mod allowance;
pub mod campaign;
pub mod claim;
pub mod distribution;
pub mod executor;
pub mod planner;
pub mod run_logger;
pub mod sender_queue;

use crate::contracts::ContractCall;
use crate::error::{DistributorError, EstimationError};
use crate::utils::gas::{saturating_u64, EstimationMode, FeeEstimator, FeeQuote};
use chrono::Utc;
use core_logic::{AttemptKind, FeeTier, MetricsCollector, RetryConfig};
use ethers::types::U256;
use executor::ExecutionOutcome;
use run_logger::{LogEntry, RunLogger};
use sender_queue::SenderQueue;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Collaborators every workload shares.
#[derive(Clone)]
pub struct EngineContext {
    pub estimator: FeeEstimator,
    pub logger: RunLogger,
    pub metrics: Arc<MetricsCollector>,
    pub retry: RetryConfig,
}

impl EngineContext {
    pub fn new(estimator: FeeEstimator, logger: RunLogger, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            estimator,
            logger,
            metrics,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_logger(&self, logger: RunLogger) -> Self {
        Self {
            logger,
            ..self.clone()
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Estimate, execute through the sender's queue, and log exactly one row.
    pub(crate) async fn attempt(
        &self,
        queue: &SenderQueue,
        call: ContractCall,
        step: Step<'_>,
    ) -> Result<Attempt, DistributorError> {
        let started = Instant::now();
        let client = queue.client();

        let quote = match self
            .estimator
            .estimate(client.as_ref(), &call, step.tier, step.mode)
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                let outcome = ExecutionOutcome::Failed {
                    cause: err.to_string(),
                    tx_hash: None,
                };
                self.record(&step, call.method, None, &outcome, started.elapsed())
                    .await?;
                return Ok(Attempt::NotEstimated(err));
            }
        };

        let method = call.method;
        let outcome = queue.execute(call, quote.clone()).await?;
        self.record(&step, method, Some(quote), &outcome, started.elapsed())
            .await?;
        Ok(Attempt::Executed(outcome))
    }

    async fn record(
        &self,
        step: &Step<'_>,
        method: &str,
        fee_quote: Option<FeeQuote>,
        outcome: &ExecutionOutcome,
        elapsed: Duration,
    ) -> Result<(), DistributorError> {
        let gas_used = outcome.gas_used().map(saturating_u64).unwrap_or(0);
        match step.scope {
            Scope::Batch => {
                self.metrics
                    .record_batch(step.batch_size, outcome.kind(), gas_used, elapsed)
            }
            Scope::Single => self.metrics.record_single(outcome.kind(), gas_used),
        }

        self.logger
            .append(&LogEntry {
                label: step.label.to_string(),
                batch_index: step.batch_index,
                batch_size: step.batch_size,
                method: method.to_string(),
                fee_quote,
                outcome: outcome.clone(),
                recorded_at: Utc::now(),
            })
            .await
    }
}

/// Identity and fee policy of one attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Step<'a> {
    pub label: &'a str,
    pub batch_index: usize,
    pub batch_size: usize,
    pub tier: FeeTier,
    pub mode: EstimationMode,
    pub scope: Scope,
}

/// Batches count towards recipient and per-recipient gas totals; single
/// supporting transactions (funding, claims) are tallied apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Batch,
    Single,
}

#[derive(Debug)]
pub(crate) enum Attempt {
    Executed(ExecutionOutcome),
    NotEstimated(EstimationError),
}

impl Attempt {
    pub(crate) fn kind(&self) -> AttemptKind {
        match self {
            Attempt::Executed(outcome) => outcome.kind(),
            Attempt::NotEstimated(_) => AttemptKind::Failed,
        }
    }

    pub(crate) fn gas_used(&self) -> U256 {
        match self {
            Attempt::Executed(outcome) => outcome.gas_used().unwrap_or_default(),
            Attempt::NotEstimated(_) => U256::zero(),
        }
    }
}
