use super::distribution::StopReason;
use super::executor::ExecutionOutcome;
use super::planner::{BatchPlanner, PlanPolicy};
use super::sender_queue::{SenderQueue, SenderQueues};
use super::{Attempt, EngineContext, Scope, Step};
use crate::chain::{read_address, ChainClient, ClientFactory};
use crate::contracts::ContractCall;
use crate::error::DistributorError;
use crate::utils::gas::{EstimationMode, FeeQuote};
use async_trait::async_trait;
use core_logic::{FeeTier, WalletRecord, Workload};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fee tiers for the three legs of a faucet cycle.
#[derive(Debug, Clone, Copy)]
pub struct FaucetTiers {
    pub admin: FeeTier,
    pub funding: FeeTier,
    pub claim: FeeTier,
}

impl Default for FaucetTiers {
    fn default() -> Self {
        Self {
            admin: FeeTier::Normal,
            funding: FeeTier::Low,
            claim: FeeTier::Normal,
        }
    }
}

/// Funds a test account and exercises its claim path.
pub struct ClaimSimulator {
    label: String,
    ctx: EngineContext,
    admin: SenderQueue,
    queues: Arc<SenderQueues>,
    tiers: FaucetTiers,
}

impl ClaimSimulator {
    pub fn new(
        label: impl Into<String>,
        ctx: EngineContext,
        admin: SenderQueue,
        queues: Arc<SenderQueues>,
        tiers: FaucetTiers,
    ) -> Self {
        Self {
            label: label.into(),
            ctx,
            admin,
            queues,
            tiers,
        }
    }

    pub fn admin(&self) -> Address {
        self.admin.sender()
    }

    /// Native transfer from the admin so the test account can pay for gas.
    pub async fn fund(
        &self,
        test_wallet: Address,
        amount: U256,
        batch_index: usize,
    ) -> Result<ExecutionOutcome, DistributorError> {
        let call = ContractCall::native_transfer(test_wallet, amount);
        let step = self.step(batch_index, 1, self.tiers.funding);
        Ok(outcome_of(self.ctx.attempt(&self.admin, call, step).await?))
    }

    /// `claim()` signed by the test wallet through a queue that lives for
    /// this call only.
    pub async fn run_claim_cycle(
        &self,
        faucet: Address,
        test_wallet: Arc<dyn ChainClient>,
        batch_index: usize,
    ) -> Result<ExecutionOutcome, DistributorError> {
        let queue = self.queues.scoped_queue_for(test_wallet);
        let step = self.step(batch_index, 1, self.tiers.claim);
        Ok(outcome_of(
            self.ctx.attempt(&queue, ContractCall::claim(faucet), step).await?,
        ))
    }

    /// Quote for a whitelist batch without sending it.
    pub async fn estimate_admin_batch(
        &self,
        faucet: Address,
        addresses: Vec<Address>,
        amounts: Vec<U256>,
    ) -> Result<FeeQuote, DistributorError> {
        let call = ContractCall::set_claimable_amounts(faucet, addresses, amounts)?;
        let client = self.admin.client();
        Ok(self
            .ctx
            .estimator
            .estimate(client.as_ref(), &call, self.tiers.admin, EstimationMode::Mandatory)
            .await?)
    }

    fn step(&self, batch_index: usize, batch_size: usize, tier: FeeTier) -> Step<'_> {
        Step {
            label: &self.label,
            batch_index,
            batch_size,
            tier,
            mode: EstimationMode::Fallback,
            scope: Scope::Single,
        }
    }
}

fn outcome_of(attempt: Attempt) -> ExecutionOutcome {
    match attempt {
        Attempt::Executed(outcome) => outcome,
        Attempt::NotEstimated(err) => ExecutionOutcome::Failed {
            cause: err.to_string(),
            tx_hash: None,
        },
    }
}

/// Totals of one faucet cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaucetReport {
    pub label: String,
    pub admin_batches: usize,
    pub admin_succeeded: usize,
    pub claims_attempted: usize,
    pub claims_succeeded: usize,
    pub admin_gas_used: U256,
    pub claim_gas_used: U256,
    pub stop: StopReason,
}

impl FaucetReport {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            admin_batches: 0,
            admin_succeeded: 0,
            claims_attempted: 0,
            claims_succeeded: 0,
            admin_gas_used: U256::zero(),
            claim_gas_used: U256::zero(),
            stop: StopReason::Completed,
        }
    }
}

/// Faucet address and per-cycle amounts.
#[derive(Debug, Clone, Copy)]
pub struct FaucetSettings {
    pub faucet: Address,
    pub batch_size: usize,
    pub claimable_amount: U256,
    pub native_funding: U256,
}

/// Whitelist every wallet chunk by chunk; after each accepted chunk, fund
/// the chunk's first wallet and claim from it.
pub struct FaucetCycle {
    label: String,
    faucet: Address,
    wallets: Arc<[WalletRecord]>,
    planner: BatchPlanner,
    simulator: ClaimSimulator,
    factory: Arc<dyn ClientFactory>,
    native_funding: U256,
}

impl FaucetCycle {
    /// `addresses` must be the parsed addresses of `wallets`, in order.
    pub fn new(
        simulator: ClaimSimulator,
        factory: Arc<dyn ClientFactory>,
        settings: FaucetSettings,
        wallets: Arc<[WalletRecord]>,
        addresses: Arc<[Address]>,
    ) -> Result<Self, DistributorError> {
        if wallets.len() != addresses.len() {
            return Err(DistributorError::LengthMismatch {
                recipients: addresses.len(),
                amounts: wallets.len(),
            });
        }
        let planner = BatchPlanner::new(
            PlanPolicy::Chunked {
                size: settings.batch_size,
            },
            addresses,
            settings.claimable_amount,
        )?;
        Ok(Self {
            label: simulator.label.clone(),
            faucet: settings.faucet,
            wallets,
            planner,
            simulator,
            factory,
            native_funding: settings.native_funding,
        })
    }

    pub async fn verify_owner(&self) -> Result<(), DistributorError> {
        let client = self.simulator.admin.client();
        let owner = read_address(
            client.as_ref(),
            &ContractCall::owner(self.faucet),
            self.simulator.ctx.retry,
        )
        .await?;
        let admin = self.simulator.admin();
        if owner != admin {
            return Err(DistributorError::NotFaucetOwner { owner, admin });
        }
        info!("[{}] Faucet owner verified: {:?}", self.label, owner);
        Ok(())
    }

    pub async fn execute(&self, cancel: CancellationToken) -> Result<FaucetReport, DistributorError> {
        let mut report = FaucetReport::new(&self.label);
        self.verify_owner().await?;

        for batch in self.planner.batches() {
            if cancel.is_cancelled() {
                warn!("[{}] Cancelled before next chunk", self.label);
                report.stop = StopReason::Cancelled;
                break;
            }

            let batch = batch?;
            let batch_index = batch.index;
            let batch_size = batch.len();
            let test_record = &self.wallets[batch.offset];
            let test_address = batch.recipients[0];

            let call =
                ContractCall::set_claimable_amounts(self.faucet, batch.recipients, batch.amounts)?;
            let step = Step {
                label: &self.label,
                batch_index,
                batch_size,
                tier: self.simulator.tiers.admin,
                mode: EstimationMode::Fallback,
                scope: Scope::Batch,
            };
            let admin_outcome =
                outcome_of(self.simulator.ctx.attempt(&self.simulator.admin, call, step).await?);

            report.admin_batches += 1;
            if !admin_outcome.is_success() {
                warn!(
                    "[{}] Whitelist chunk #{} {}; skipping its claim",
                    self.label,
                    batch_index,
                    admin_outcome.label()
                );
                continue;
            }
            report.admin_succeeded += 1;
            report.admin_gas_used += admin_outcome.gas_used().unwrap_or_default();

            let funding = self
                .simulator
                .fund(test_address, self.native_funding, batch_index)
                .await?;
            if !funding.is_success() {
                warn!(
                    "[{}] Funding {:?} {}; skipping its claim",
                    self.label,
                    test_address,
                    funding.label()
                );
                continue;
            }

            let client = self.factory.client_for(test_record)?;
            let claim = self
                .simulator
                .run_claim_cycle(self.faucet, client, batch_index)
                .await?;
            report.claims_attempted += 1;
            if let Some(gas) = claim.gas_used() {
                report.claims_succeeded += 1;
                report.claim_gas_used += gas;
            }
        }

        info!(
            "[{}] Faucet cycle done: {}/{} chunks whitelisted, {}/{} claims, gas admin {} claims {}",
            self.label,
            report.admin_succeeded,
            report.admin_batches,
            report.claims_succeeded,
            report.claims_attempted,
            report.admin_gas_used,
            report.claim_gas_used
        );
        Ok(report)
    }
}

#[async_trait]
impl Workload for FaucetCycle {
    type Report = FaucetReport;
    type Error = DistributorError;

    fn name(&self) -> &str {
        &self.label
    }

    async fn run(&self, cancel: CancellationToken) -> Result<FaucetReport, DistributorError> {
        self.execute(cancel).await
    }
}
