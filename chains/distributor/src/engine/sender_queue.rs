//! One worker task per sender account.
//!
//! Every transaction from a given sender goes through that sender's queue, so
//! the next nonce is never taken before the previous outcome is known, no
//! matter how many workloads share the account.

use super::executor::{ExecutionOutcome, TransactionExecutor};
use crate::chain::ChainClient;
use crate::contracts::ContractCall;
use crate::error::DistributorError;
use crate::utils::gas::FeeQuote;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const QUEUE_DEPTH: usize = 32;

struct Job {
    call: ContractCall,
    quote: FeeQuote,
    reply: oneshot::Sender<ExecutionOutcome>,
}

#[derive(Clone)]
pub struct SenderQueue {
    sender: Address,
    client: Arc<dyn ChainClient>,
    jobs: mpsc::Sender<Job>,
}

impl SenderQueue {
    /// Spawns the worker. Must be called inside a tokio runtime.
    pub fn spawn(executor: TransactionExecutor) -> Self {
        let (jobs, mut rx) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let sender = executor.sender();
        let client = executor.client();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let outcome = executor.submit_and_confirm(&job.call, &job.quote).await;
                // The caller may be gone; the outcome was still waited out.
                let _ = job.reply.send(outcome);
            }
            debug!("Sender queue for {:?} drained", sender);
        });

        Self {
            sender,
            client,
            jobs,
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Client of the queue's sender, for reads and estimation.
    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    pub async fn execute(
        &self,
        call: ContractCall,
        quote: FeeQuote,
    ) -> Result<ExecutionOutcome, DistributorError> {
        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send(Job { call, quote, reply })
            .await
            .map_err(|_| DistributorError::QueueClosed(self.sender))?;
        outcome
            .await
            .map_err(|_| DistributorError::QueueClosed(self.sender))
    }
}

/// Hands out exactly one queue per sender address.
pub struct SenderQueues {
    confirmation_timeout: Duration,
    queues: Mutex<HashMap<Address, SenderQueue>>,
}

impl SenderQueues {
    pub fn new(confirmation_timeout: Duration) -> Self {
        Self {
            confirmation_timeout,
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn queue_for(&self, client: Arc<dyn ChainClient>) -> SenderQueue {
        let mut queues = self
            .queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queues
            .entry(client.sender())
            .or_insert_with(|| {
                SenderQueue::spawn(TransactionExecutor::new(client, self.confirmation_timeout))
            })
            .clone()
    }

    /// The registered queue when the sender already has one, otherwise a
    /// queue that is not registered. Its worker exits once every handle to it
    /// is dropped, so one-off senders do not accumulate.
    pub fn scoped_queue_for(&self, client: Arc<dyn ChainClient>) -> SenderQueue {
        let queues = self
            .queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match queues.get(&client.sender()) {
            Some(queue) => queue.clone(),
            None => SenderQueue::spawn(TransactionExecutor::new(client, self.confirmation_timeout)),
        }
    }

    pub fn len(&self) -> usize {
        self.queues
            .lock()
            .map(|queues| queues.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
