//! Wires configuration, clients and the engine into the runnable commands.

use crate::chain::ethers_client::connect;
use crate::chain::{ChainClient, ClientFactory, EthersClientFactory};
use crate::config::{DistributorConfig, Secrets};
use crate::engine::allowance::{AllowanceManager, AllowanceState};
use crate::engine::campaign::CampaignJob;
use crate::engine::claim::{ClaimSimulator, FaucetCycle, FaucetSettings, FaucetTiers};
use crate::engine::distribution::{DistributionRun, DistributionTarget};
use crate::engine::planner::{BatchPlanner, PlanPolicy};
use crate::engine::run_logger::RunLogger;
use crate::engine::sender_queue::SenderQueues;
use crate::engine::EngineContext;
use crate::error::DistributorError;
use crate::utils::gas::{FeeEstimator, FeeQuote};
use crate::utils::keys::{parse_private_key, record_address, EthersWalletGenerator};
use core_logic::{FeeTier, MetricsCollector, WalletRecord, WalletStore};
use ethers::types::{Address, U256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Recipient wallets plus their parsed addresses, in store order.
#[derive(Clone)]
pub struct WalletSet {
    pub records: Arc<[WalletRecord]>,
    pub addresses: Arc<[Address]>,
}

impl WalletSet {
    pub fn from_records(records: Vec<WalletRecord>) -> Result<Self, DistributorError> {
        let addresses = records
            .iter()
            .map(record_address)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            records: records.into(),
            addresses: addresses.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct App {
    config: DistributorConfig,
    factory: Arc<dyn ClientFactory>,
    sender: Arc<dyn ChainClient>,
    admin: Arc<dyn ChainClient>,
    queues: Arc<SenderQueues>,
    metrics: Arc<MetricsCollector>,
    estimator: FeeEstimator,
    loggers: Mutex<HashMap<String, RunLogger>>,
}

impl App {
    /// Connects to the configured node and builds one signer per key.
    pub fn connect(config: DistributorConfig, secrets: &Secrets) -> Result<Self, DistributorError> {
        let provider = Arc::new(connect(&config.chain.rpc_url)?);
        let factory =
            EthersClientFactory::new(provider, config.chain.chain_id, config.confirmation);

        let sender = factory.client_for_wallet(parse_private_key(&secrets.private_key, "PRIVATE_KEY")?);
        let admin =
            factory.client_for_wallet(parse_private_key(secrets.admin_key(), "FAUCET_ADMIN_KEY")?);
        info!(
            "Connected to chain {} as {:?} (faucet admin {:?})",
            config.chain.chain_id,
            sender.sender(),
            admin.sender()
        );

        Ok(Self::with_clients(config, Arc::new(factory), sender, admin))
    }

    /// Builds the app over already constructed clients.
    pub fn with_clients(
        config: DistributorConfig,
        factory: Arc<dyn ClientFactory>,
        sender: Arc<dyn ChainClient>,
        admin: Arc<dyn ChainClient>,
    ) -> Self {
        let queues = Arc::new(SenderQueues::new(config.confirmation.timeout()));
        let estimator = FeeEstimator::new(config.gas_config());
        Self {
            config,
            factory,
            sender,
            admin,
            queues,
            metrics: Arc::new(MetricsCollector::new()),
            estimator,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Loads the store, generating it when absent.
    pub fn load_wallets(&self, count: Option<usize>) -> Result<WalletSet, DistributorError> {
        let count = count.or(self.config.wallets.count);
        let records = WalletStore::load_or_generate(
            &self.config.wallets.path,
            count,
            &mut EthersWalletGenerator,
        )?;
        WalletSet::from_records(records)
    }

    /// Raises the distribution sender's allowance for the multi-sender.
    pub async fn approve(&self, amount: Option<U256>) -> Result<AllowanceState, DistributorError> {
        let required = match amount {
            Some(amount) => amount,
            None => self.config.approval_amount()?,
        };
        let queue = self.queues.queue_for(self.sender.clone());
        let manager = AllowanceManager::new(
            queue.clone(),
            self.estimator.clone(),
            self.config.distribute.tier,
        );
        manager
            .ensure_allowance(
                self.config.contracts.token,
                queue.sender(),
                self.config.contracts.multi_sender,
                required,
            )
            .await
    }

    /// Fixed-list run; `sizes` overrides the configured list.
    pub fn distribution_run(
        &self,
        wallets: &WalletSet,
        sizes: Option<Vec<usize>>,
    ) -> Result<DistributionRun, DistributorError> {
        let settings = &self.config.distribute;
        let sizes = sizes.unwrap_or_else(|| settings.sizes.clone());
        let planner = BatchPlanner::new(
            PlanPolicy::Fixed { sizes },
            wallets.addresses.clone(),
            self.config.distribute_amount()?,
        )?;
        self.token_run(
            "distribute",
            planner,
            &settings.log_path,
            settings.tier,
            self.config.approval_amount()?,
        )
    }

    /// Adaptive scan; `None` keeps the configured start and step.
    pub fn scan_run(
        &self,
        wallets: &WalletSet,
        initial: Option<usize>,
        step: Option<usize>,
    ) -> Result<DistributionRun, DistributorError> {
        let settings = &self.config.scan;
        let planner = BatchPlanner::new(
            PlanPolicy::Adaptive {
                initial: initial.unwrap_or(settings.initial),
                step: step.unwrap_or(settings.step),
            },
            wallets.addresses.clone(),
            self.config.scan_amount()?,
        )?;
        self.token_run(
            "scan",
            planner,
            &settings.log_path,
            settings.tier,
            U256::zero(),
        )
    }

    fn token_run(
        &self,
        label: &str,
        planner: BatchPlanner,
        log_path: &str,
        tier: FeeTier,
        approval_amount: U256,
    ) -> Result<DistributionRun, DistributorError> {
        let target = DistributionTarget {
            token: self.config.contracts.token,
            multi_sender: self.config.contracts.multi_sender,
        };
        Ok(DistributionRun::new(
            label,
            planner,
            self.queues.queue_for(self.sender.clone()),
            self.context(log_path)?,
            target,
            tier,
            approval_amount,
        ))
    }

    fn claim_simulator(&self) -> Result<ClaimSimulator, DistributorError> {
        let settings = &self.config.faucet;
        Ok(ClaimSimulator::new(
            "faucet",
            self.context(&settings.log_path)?,
            self.queues.queue_for(self.admin.clone()),
            self.queues.clone(),
            FaucetTiers {
                admin: settings.admin_tier,
                funding: settings.funding_tier,
                claim: settings.claim_tier,
            },
        ))
    }

    pub fn faucet_cycle(&self, wallets: &WalletSet) -> Result<FaucetCycle, DistributorError> {
        let settings = FaucetSettings {
            faucet: self.config.faucet_address()?,
            batch_size: self.config.faucet.batch_size,
            claimable_amount: self.config.claimable_amount()?,
            native_funding: self.config.native_funding()?,
        };
        FaucetCycle::new(
            self.claim_simulator()?,
            self.factory.clone(),
            settings,
            wallets.records.clone(),
            wallets.addresses.clone(),
        )
    }

    /// Quotes `setClaimableAmounts` for the first `count` wallets without sending.
    pub async fn estimate_faucet(
        &self,
        wallets: &WalletSet,
        count: usize,
    ) -> Result<FeeQuote, DistributorError> {
        if count > wallets.len() {
            return Err(DistributorError::InsufficientWallets {
                requested: count,
                available: wallets.len(),
            });
        }
        let faucet = self.config.faucet_address()?;
        let amount = self.config.claimable_amount()?;
        let addresses = wallets.addresses[..count].to_vec();
        self.claim_simulator()?
            .estimate_admin_batch(faucet, addresses, vec![amount; count])
            .await
    }

    /// Fixed-list distribution and the faucet cycle, run side by side.
    pub fn campaign(&self, wallets: &WalletSet) -> Result<Vec<CampaignJob>, DistributorError> {
        Ok(vec![
            CampaignJob::Distribution(self.distribution_run(wallets, None)?),
            CampaignJob::Faucet(self.faucet_cycle(wallets)?),
        ])
    }

    fn context(&self, log_path: &str) -> Result<EngineContext, DistributorError> {
        Ok(EngineContext::new(
            self.estimator.clone(),
            self.logger_for(log_path)?,
            self.metrics.clone(),
        ))
    }

    /// One writer per log path, shared by every workload that names it.
    fn logger_for(&self, log_path: &str) -> Result<RunLogger, DistributorError> {
        let mut loggers = self
            .loggers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(logger) = loggers.get(log_path) {
            return Ok(logger.clone());
        }
        let logger = RunLogger::open(log_path)?;
        loggers.insert(log_path.to_string(), logger.clone());
        Ok(logger)
    }
}
