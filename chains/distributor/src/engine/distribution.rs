use super::allowance::AllowanceManager;
use super::planner::{BatchPlanner, PlanPolicy};
use super::sender_queue::SenderQueue;
use super::{Attempt, EngineContext, Scope, Step};
use crate::contracts::ContractCall;
use crate::error::DistributorError;
use crate::utils::gas::EstimationMode;
use async_trait::async_trait;
use core_logic::{AttemptKind, FeeTier, Workload};
use ethers::types::{Address, U256};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Cancelled,
    BatchFailed {
        batch_index: usize,
        batch_size: usize,
    },
    EstimationFailed {
        batch_index: usize,
        batch_size: usize,
        reason: String,
    },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::BatchFailed {
                batch_index,
                batch_size,
            } => write!(f, "batch #{} ({} recipients) failed", batch_index, batch_size),
            StopReason::EstimationFailed {
                batch_index,
                batch_size,
                reason,
            } => write!(
                f,
                "estimation for batch #{} ({} recipients) failed: {}",
                batch_index, batch_size, reason
            ),
        }
    }
}

/// Summary of one distribution or scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub label: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub reverted: usize,
    pub failed: usize,
    pub total_gas_used: U256,
    pub largest_successful_batch: Option<usize>,
    pub stop: StopReason,
}

impl RunReport {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            attempted: 0,
            succeeded: 0,
            reverted: 0,
            failed: 0,
            total_gas_used: U256::zero(),
            largest_successful_batch: None,
            stop: StopReason::Completed,
        }
    }

    pub(crate) fn record(&mut self, batch_size: usize, attempt: &Attempt) {
        self.attempted += 1;
        match attempt.kind() {
            AttemptKind::Success => {
                self.succeeded += 1;
                self.total_gas_used += attempt.gas_used();
                self.largest_successful_batch = Some(
                    self.largest_successful_batch
                        .map_or(batch_size, |largest| largest.max(batch_size)),
                );
            }
            AttemptKind::Reverted => self.reverted += 1,
            AttemptKind::Failed => self.failed += 1,
        }
    }
}

/// Where the tokens come from and go through.
#[derive(Debug, Clone, Copy)]
pub struct DistributionTarget {
    pub token: Address,
    pub multi_sender: Address,
}

/// Fixed-list distribution or adaptive scan over `multiSendToken`.
///
/// A fixed list records every outcome and moves on, unless a revert leaves
/// the allowance short of what the rest of the plan needs. An adaptive scan
/// requires a real estimate for each size and stops at the first attempt
/// that is not a success.
pub struct DistributionRun {
    label: String,
    planner: BatchPlanner,
    queue: SenderQueue,
    allowance: AllowanceManager,
    ctx: EngineContext,
    target: DistributionTarget,
    tier: FeeTier,
    approval_amount: U256,
}

impl DistributionRun {
    pub fn new(
        label: impl Into<String>,
        planner: BatchPlanner,
        queue: SenderQueue,
        ctx: EngineContext,
        target: DistributionTarget,
        tier: FeeTier,
        approval_amount: U256,
    ) -> Self {
        let allowance = AllowanceManager::new(queue.clone(), ctx.estimator.clone(), tier)
            .with_retry(ctx.retry);
        Self {
            label: label.into(),
            planner,
            queue,
            allowance,
            ctx,
            target,
            tier,
            approval_amount,
        }
    }

    fn is_scan(&self) -> bool {
        matches!(self.planner.policy(), PlanPolicy::Adaptive { .. })
    }

    /// Allowance the whole plan needs.
    pub fn required_allowance(&self) -> U256 {
        self.approval_amount.max(self.planner.total_amount())
    }

    /// A revert may mean the allowance ran dry mid-run. If it can no longer
    /// cover this batch and every later one, no further transfer can succeed.
    async fn check_allowance_after_revert(&self, batch_index: usize) -> Result<(), DistributorError> {
        let allowance = self
            .allowance
            .current(self.target.token, self.queue.sender(), self.target.multi_sender)
            .await?;
        let required = self.planner.amount_from(batch_index);
        if allowance < required {
            warn!(
                "[{}] Allowance {} is below the {} still planned; stopping",
                self.label, allowance, required
            );
            return Err(DistributorError::AllowanceExhausted {
                batch_index,
                allowance,
                required,
            });
        }
        Ok(())
    }

    pub async fn execute(&self, cancel: CancellationToken) -> Result<RunReport, DistributorError> {
        let mut report = RunReport::new(&self.label);
        if cancel.is_cancelled() {
            report.stop = StopReason::Cancelled;
            return Ok(report);
        }

        let scanning = self.is_scan();
        let mode = if scanning {
            EstimationMode::Mandatory
        } else {
            EstimationMode::Fallback
        };

        self.allowance
            .ensure_allowance(
                self.target.token,
                self.queue.sender(),
                self.target.multi_sender,
                self.required_allowance(),
            )
            .await?;

        info!(
            "[{}] Planned batch sizes: {:?} ({} wallets available)",
            self.label,
            self.planner.planned_sizes(),
            self.planner.available()
        );

        for batch in self.planner.batches() {
            if cancel.is_cancelled() {
                warn!("[{}] Cancelled before next batch", self.label);
                report.stop = StopReason::Cancelled;
                break;
            }

            let batch = batch?;
            let batch_index = batch.index;
            let batch_size = batch.len();
            let call = ContractCall::multi_send(
                self.target.multi_sender,
                self.target.token,
                batch.recipients,
                batch.amounts,
            )?;

            let attempt = self
                .ctx
                .attempt(
                    &self.queue,
                    call,
                    Step {
                        label: &self.label,
                        batch_index,
                        batch_size,
                        tier: self.tier,
                        mode,
                        scope: Scope::Batch,
                    },
                )
                .await?;
            report.record(batch_size, &attempt);

            if attempt.kind() == AttemptKind::Reverted {
                self.check_allowance_after_revert(batch_index).await?;
            }

            if !scanning {
                continue;
            }
            match attempt {
                Attempt::Executed(outcome) if outcome.is_success() => {}
                Attempt::Executed(_) => {
                    report.stop = StopReason::BatchFailed {
                        batch_index,
                        batch_size,
                    };
                    break;
                }
                Attempt::NotEstimated(err) => {
                    report.stop = StopReason::EstimationFailed {
                        batch_index,
                        batch_size,
                        reason: err.reason,
                    };
                    break;
                }
            }
        }

        info!("[{}] Finished: {}", self.label, report.stop);
        Ok(report)
    }
}

#[async_trait]
impl Workload for DistributionRun {
    type Report = RunReport;
    type Error = DistributorError;

    fn name(&self) -> &str {
        &self.label
    }

    async fn run(&self, cancel: CancellationToken) -> Result<RunReport, DistributorError> {
        self.execute(cancel).await
    }
}
