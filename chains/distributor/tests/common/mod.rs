#![allow(dead_code)]

use async_trait::async_trait;
use core_logic::{GasConfig, MemorySink, MetricsCollector, WalletRecord};
use distributor::chain::{ChainClient, ClientFactory, ReceiptInfo};
use distributor::contracts::{
    ApproveCall, ContractCall, MultiSendTokenCall, SetClaimableAmountsCall,
};
use distributor::engine::run_logger::RunLogger;
use distributor::engine::EngineContext;
use distributor::utils::gas::{FeeEstimator, FeeQuote};
use distributor::{ChainError, DistributorError};
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::{Address, Bytes, H256, U256, U64};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One transaction accepted by the fake node.
#[derive(Debug, Clone)]
pub struct Submission {
    pub sender: Address,
    pub to: Address,
    pub method: &'static str,
    pub recipients: usize,
    pub nonce: U256,
    pub value: U256,
    pub gas_limit: U256,
    pub priority_fee: U256,
    pub max_fee: U256,
}

/// Knobs for the scripted node.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub allowance: U256,
    /// Allowance reported after a confirmed approval; the approved amount otherwise.
    pub allowance_after_approve: Option<U256>,
    pub owner: Address,
    pub estimate_always_fails: bool,
    /// `multiSendToken` estimation fails above this many recipients.
    pub estimate_fails_above: Option<usize>,
    /// `multiSendToken` reverts on chain above this many recipients.
    pub revert_above: Option<usize>,
    /// `multiSendToken` pulls its total from the allowance and reverts when short.
    pub spend_allowance: bool,
    /// Allowance another spender takes after each successful `multiSendToken`.
    pub allowance_drain: U256,
    /// Zero-based positions of `setClaimableAmounts` submissions that revert.
    pub failing_admin_calls: HashSet<usize>,
    /// Native transfers to these addresses revert.
    pub failing_fundings: HashSet<Address>,
    pub hang_receipts: bool,
    pub receipt_delay: Option<Duration>,
}

#[derive(Default)]
struct State {
    script: Script,
    nonces: HashMap<Address, U256>,
    receipts: HashMap<H256, ReceiptInfo>,
    submissions: Vec<Submission>,
    admin_calls: usize,
    in_flight: HashMap<Address, usize>,
    max_in_flight: HashMap<Address, usize>,
    nonce_lookups: usize,
    estimates: usize,
}

/// Shared state of the fake network; every client talks to the same one.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<State>>,
}

impl FakeNetwork {
    pub fn new(script: Script) -> Self {
        let network = Self::default();
        network.state.lock().unwrap().script = script;
        network
    }

    pub fn client(&self, sender: Address) -> Arc<FakeChain> {
        Arc::new(FakeChain {
            sender,
            network: self.clone(),
        })
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submissions_of(&self, method: &str) -> Vec<Submission> {
        self.submissions()
            .into_iter()
            .filter(|s| s.method == method)
            .collect()
    }

    pub fn allowance(&self) -> U256 {
        self.state.lock().unwrap().script.allowance
    }

    pub fn max_in_flight(&self, sender: Address) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_in_flight
            .get(&sender)
            .copied()
            .unwrap_or_default()
    }

    pub fn nonce_lookups(&self) -> usize {
        self.state.lock().unwrap().nonce_lookups
    }

    pub fn estimates(&self) -> usize {
        self.state.lock().unwrap().estimates
    }

    pub fn set_hang_receipts(&self, hang: bool) {
        self.state.lock().unwrap().script.hang_receipts = hang;
    }
}

fn recipients_of(call: &ContractCall) -> usize {
    match call.method {
        "multiSendToken" => MultiSendTokenCall::decode(&call.data)
            .map(|c| c.recipients.len())
            .unwrap_or_default(),
        "setClaimableAmounts" => SetClaimableAmountsCall::decode(&call.data)
            .map(|c| c.addresses.len())
            .unwrap_or_default(),
        _ => 1,
    }
}

fn gas_for(call: &ContractCall) -> U256 {
    match call.method {
        "transfer" => U256::from(21_000u64),
        "approve" => U256::from(46_000u64),
        "claim" => U256::from(55_000u64),
        _ => U256::from(30_000u64 + 25_000u64 * recipients_of(call) as u64),
    }
}

pub struct FakeChain {
    sender: Address,
    network: FakeNetwork,
}

#[async_trait]
impl ChainClient for FakeChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn read(&self, call: &ContractCall) -> Result<Bytes, ChainError> {
        let state = self.network.state.lock().unwrap();
        match call.method {
            "allowance" => Ok(Bytes::from(state.script.allowance.encode())),
            "owner" => Ok(Bytes::from(state.script.owner.encode())),
            other => Err(ChainError::Rpc(format!("unexpected read {}", other))),
        }
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<U256, ChainError> {
        let mut state = self.network.state.lock().unwrap();
        state.estimates += 1;
        if state.script.estimate_always_fails {
            return Err(ChainError::Rpc("execution reverted".to_string()));
        }
        if call.method == "multiSendToken" {
            if let Some(limit) = state.script.estimate_fails_above {
                if recipients_of(call) > limit {
                    return Err(ChainError::Rpc(
                        "execution reverted: out of gas".to_string(),
                    ));
                }
            }
        }
        Ok(gas_for(call))
    }

    async fn pending_nonce(&self) -> Result<U256, ChainError> {
        let mut state = self.network.state.lock().unwrap();
        state.nonce_lookups += 1;
        Ok(state.nonces.get(&self.sender).copied().unwrap_or_default())
    }

    async fn submit(
        &self,
        call: &ContractCall,
        quote: &FeeQuote,
        nonce: U256,
    ) -> Result<H256, ChainError> {
        let mut state = self.network.state.lock().unwrap();
        let expected = state.nonces.get(&self.sender).copied().unwrap_or_default();
        if nonce != expected {
            return Err(ChainError::Rejected(format!(
                "nonce {} does not match expected {}",
                nonce, expected
            )));
        }
        state.nonces.insert(self.sender, expected + 1);

        let recipients = recipients_of(call);
        let success = match call.method {
            "multiSendToken" => {
                let fits = state
                    .script
                    .revert_above
                    .map_or(true, |limit| recipients <= limit);
                if fits && state.script.spend_allowance {
                    let total = MultiSendTokenCall::decode(&call.data)
                        .map(|c| c.amounts.iter().fold(U256::zero(), |acc, a| acc + *a))
                        .map_err(|e| ChainError::Decode(e.to_string()))?;
                    if state.script.allowance < total {
                        false
                    } else {
                        let drain = state.script.allowance_drain;
                        state.script.allowance = (state.script.allowance - total).saturating_sub(drain);
                        true
                    }
                } else {
                    fits
                }
            }
            "setClaimableAmounts" => {
                let position = state.admin_calls;
                state.admin_calls += 1;
                !state.script.failing_admin_calls.contains(&position)
            }
            "transfer" => !state.script.failing_fundings.contains(&call.to),
            _ => true,
        };

        if success && call.method == "approve" {
            let amount = ApproveCall::decode(&call.data)
                .map(|c| c.amount)
                .map_err(|e| ChainError::Decode(e.to_string()))?;
            state.script.allowance = state.script.allowance_after_approve.unwrap_or(amount);
        }

        state.submissions.push(Submission {
            sender: self.sender,
            to: call.to,
            method: call.method,
            recipients,
            nonce,
            value: call.value,
            gas_limit: quote.gas_limit,
            priority_fee: quote.priority_fee,
            max_fee: quote.max_fee,
        });

        let tx_hash = H256::from_low_u64_be(state.submissions.len() as u64);
        let gas_used = if success {
            gas_for(call)
        } else {
            U256::from(29_000u64)
        };
        let block_number = Some(U64::from(state.submissions.len() as u64));
        state.receipts.insert(
            tx_hash,
            ReceiptInfo {
                tx_hash,
                gas_used,
                success,
                block_number,
            },
        );

        let in_flight = state.in_flight.entry(self.sender).or_default();
        *in_flight += 1;
        let current = *in_flight;
        let max = state.max_in_flight.entry(self.sender).or_default();
        *max = (*max).max(current);

        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptInfo, ChainError> {
        let (hang, delay) = {
            let state = self.network.state.lock().unwrap();
            (state.script.hang_receipts, state.script.receipt_delay)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.network.state.lock().unwrap();
        if let Some(in_flight) = state.in_flight.get_mut(&self.sender) {
            *in_flight = in_flight.saturating_sub(1);
        }
        state
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(ChainError::Dropped(tx_hash))
    }

    async fn revert_reason(&self, call: &ContractCall, _block: Option<U64>) -> Option<String> {
        Some(format!("{} reverted", call.method))
    }
}

/// Hands out fake clients for wallet records and remembers who asked.
pub struct FakeFactory {
    network: FakeNetwork,
    requested: Mutex<Vec<Address>>,
}

impl FakeFactory {
    pub fn new(network: FakeNetwork) -> Self {
        Self {
            network,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<Address> {
        self.requested.lock().unwrap().clone()
    }
}

impl ClientFactory for FakeFactory {
    fn client_for(&self, record: &WalletRecord) -> Result<Arc<dyn ChainClient>, DistributorError> {
        let address: Address = record
            .address()
            .parse()
            .map_err(|_| ChainError::Decode(format!("bad address {}", record.address())))?;
        self.requested.lock().unwrap().push(address);
        Ok(self.network.client(address))
    }
}

pub fn address(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// `count` deterministic recipient addresses starting at 0x..1000.
pub fn addresses(count: usize) -> Arc<[Address]> {
    (0..count as u64).map(|i| address(0x1000 + i)).collect()
}

/// Wallet records whose addresses match [`addresses`].
pub fn records(count: usize) -> Vec<WalletRecord> {
    (0..count as u64)
        .map(|i| {
            WalletRecord::new(
                format!("{:?}", address(0x1000 + i)),
                format!("0x{:064x}", i + 1),
            )
        })
        .collect()
}

pub fn context(sink: &MemorySink) -> (EngineContext, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new());
    let ctx = EngineContext::new(
        FeeEstimator::new(GasConfig::default()),
        RunLogger::new(sink.clone()),
        metrics.clone(),
    );
    (ctx, metrics)
}

/// Data rows of the log (header dropped), split on commas.
pub fn rows(sink: &MemorySink) -> Vec<Vec<String>> {
    sink.lines()
        .into_iter()
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

pub const COL_LABEL: usize = 1;
pub const COL_BATCH_INDEX: usize = 2;
pub const COL_BATCH_SIZE: usize = 3;
pub const COL_METHOD: usize = 4;
pub const COL_GAS_ESTIMATE: usize = 5;
pub const COL_GAS_LIMIT: usize = 6;
pub const COL_OUTCOME: usize = 9;
