use crate::error::DistributorError;
use ethers::types::{Address, U256};
use std::sync::Arc;

/// How batch sizes are derived from the wallet sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanPolicy {
    /// Declared sizes, each batch the first N wallets. Sizes run in the
    /// order given and need not ascend; zero is rejected.
    Fixed { sizes: Vec<usize> },
    /// `initial`, `initial + step`, ... while it fits; growing prefix.
    Adaptive { initial: usize, step: usize },
    /// Consecutive windows of `size` over the whole sequence.
    Chunked { size: usize },
}

/// One planned transaction's worth of recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    /// Position of the first recipient in the wallet sequence.
    pub offset: usize,
    pub recipients: Vec<Address>,
    pub amounts: Vec<U256>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BatchPlanner {
    policy: PlanPolicy,
    wallets: Arc<[Address]>,
    amount: U256,
}

impl BatchPlanner {
    pub fn new(
        policy: PlanPolicy,
        wallets: Arc<[Address]>,
        amount: U256,
    ) -> Result<Self, DistributorError> {
        match &policy {
            PlanPolicy::Fixed { sizes } => {
                if sizes.is_empty() {
                    return Err(DistributorError::config(
                        "distribute.sizes",
                        "at least one batch size is required",
                    ));
                }
                if sizes.contains(&0) {
                    return Err(DistributorError::config(
                        "distribute.sizes",
                        "batch sizes must be greater than zero",
                    ));
                }
            }
            PlanPolicy::Adaptive { initial, step } => {
                if *initial == 0 || *step == 0 {
                    return Err(DistributorError::config(
                        "scan",
                        "initial size and step must be greater than zero",
                    ));
                }
            }
            PlanPolicy::Chunked { size } => {
                if *size == 0 {
                    return Err(DistributorError::config(
                        "faucet.batch_size",
                        "must be greater than zero",
                    ));
                }
            }
        }

        Ok(Self {
            policy,
            wallets,
            amount,
        })
    }

    pub fn policy(&self) -> &PlanPolicy {
        &self.policy
    }

    pub fn available(&self) -> usize {
        self.wallets.len()
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    /// Batch at `index`, `None` once the plan is exhausted.
    pub fn batch(&self, index: usize) -> Option<Result<Batch, DistributorError>> {
        let available = self.wallets.len();
        let (offset, size) = match &self.policy {
            PlanPolicy::Fixed { sizes } => (0, *sizes.get(index)?),
            PlanPolicy::Adaptive { initial, step } => {
                if index == 0 && *initial > available {
                    return Some(Err(DistributorError::InsufficientWallets {
                        requested: *initial,
                        available,
                    }));
                }
                let size = step.checked_mul(index)?.checked_add(*initial)?;
                if size > available {
                    return None;
                }
                (0, size)
            }
            PlanPolicy::Chunked { size } => {
                let offset = size.checked_mul(index)?;
                if offset >= available {
                    return None;
                }
                (offset, (*size).min(available - offset))
            }
        };

        if offset + size > available {
            return Some(Err(DistributorError::InsufficientWallets {
                requested: size,
                available,
            }));
        }

        Some(Ok(Batch {
            index,
            offset,
            recipients: self.wallets[offset..offset + size].to_vec(),
            amounts: vec![self.amount; size],
        }))
    }

    /// Lazily yields the plan; stops after the first error.
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            planner: self,
            next: 0,
            done: false,
        }
    }

    /// Sizes of the batches that can actually be built, in order.
    pub fn planned_sizes(&self) -> Vec<usize> {
        self.batches()
            .map_while(|batch| batch.ok().map(|b| b.len()))
            .collect()
    }

    /// Sum of every amount in [`planned_sizes`](Self::planned_sizes).
    pub fn total_amount(&self) -> U256 {
        self.amount_from(0)
    }

    /// Amount the batches from `index` onwards still need.
    pub fn amount_from(&self, index: usize) -> U256 {
        let recipients: usize = self.planned_sizes().iter().skip(index).sum();
        self.amount.saturating_mul(U256::from(recipients))
    }
}

pub struct Batches<'a> {
    planner: &'a BatchPlanner,
    next: usize,
    done: bool,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch, DistributorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.planner.batch(self.next);
        match &item {
            None | Some(Err(_)) => self.done = true,
            Some(Ok(_)) => self.next += 1,
        }
        item
    }
}
