use super::claim::{FaucetCycle, FaucetReport};
use super::distribution::{DistributionRun, RunReport};
use crate::error::DistributorError;
use async_trait::async_trait;
use core_logic::Workload;
use tokio_util::sync::CancellationToken;

/// Either workload, so independent senders can run side by side under one
/// runner.
pub enum CampaignJob {
    Distribution(DistributionRun),
    Faucet(FaucetCycle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Distribution(RunReport),
    Faucet(FaucetReport),
}

#[async_trait]
impl Workload for CampaignJob {
    type Report = JobReport;
    type Error = DistributorError;

    fn name(&self) -> &str {
        match self {
            CampaignJob::Distribution(run) => run.name(),
            CampaignJob::Faucet(cycle) => cycle.name(),
        }
    }

    async fn run(&self, cancel: CancellationToken) -> Result<JobReport, DistributorError> {
        match self {
            CampaignJob::Distribution(run) => run.execute(cancel).await.map(JobReport::Distribution),
            CampaignJob::Faucet(cycle) => cycle.execute(cancel).await.map(JobReport::Faucet),
        }
    }
}
