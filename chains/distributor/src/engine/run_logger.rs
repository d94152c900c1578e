use super::executor::ExecutionOutcome;
use crate::error::DistributorError;
use crate::utils::gas::{FeeQuote, QuoteSource};
use chrono::{DateTime, SecondsFormat, Utc};
use core_logic::{CsvLog, FileSink, LogSink, BATCH_RESULT_TARGET};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub const RUN_LOG_HEADER: &[&str] = &[
    "recorded_at",
    "label",
    "batch_index",
    "batch_size",
    "method",
    "gas_estimate",
    "gas_limit",
    "priority_fee",
    "max_fee",
    "outcome",
    "tx_hash",
    "gas_used",
    "detail",
];

/// One row of the run log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub label: String,
    pub batch_index: usize,
    pub batch_size: usize,
    pub method: String,
    /// Absent when estimation itself failed.
    pub fee_quote: Option<FeeQuote>,
    pub outcome: ExecutionOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl LogEntry {
    fn to_row(&self) -> Vec<String> {
        let (gas_estimate, gas_limit, priority_fee, max_fee) = match &self.fee_quote {
            Some(quote) => (
                match quote.source {
                    QuoteSource::Estimated { raw } => raw.to_string(),
                    QuoteSource::Fallback => "fallback".to_string(),
                },
                quote.gas_limit.to_string(),
                quote.priority_fee.to_string(),
                quote.max_fee.to_string(),
            ),
            None => Default::default(),
        };

        vec![
            self.recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.label.clone(),
            self.batch_index.to_string(),
            self.batch_size.to_string(),
            self.method.clone(),
            gas_estimate,
            gas_limit,
            priority_fee,
            max_fee,
            self.outcome.label().to_string(),
            self.outcome
                .tx_hash()
                .map(|hash| format!("{:?}", hash))
                .unwrap_or_default(),
            self.outcome
                .gas_used()
                .map(|gas| gas.to_string())
                .unwrap_or_default(),
            self.outcome.detail().to_string(),
        ]
    }
}

/// Append-only CSV audit trail. Clones share one writer.
#[derive(Clone)]
pub struct RunLogger {
    log: Arc<Mutex<CsvLog<Box<dyn LogSink>>>>,
}

impl RunLogger {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        let sink: Box<dyn LogSink> = Box::new(sink);
        Self {
            log: Arc::new(Mutex::new(CsvLog::new(sink, RUN_LOG_HEADER))),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DistributorError> {
        Ok(Self::new(FileSink::open(path)?))
    }

    /// Returns once the row is durable.
    pub async fn append(&self, entry: &LogEntry) -> Result<(), DistributorError> {
        info!(
            target: BATCH_RESULT_TARGET,
            "[{}] {} #{} ({} recipients) {} {}",
            entry.label,
            entry.method,
            entry.batch_index,
            entry.batch_size,
            entry.outcome.label(),
            entry.outcome.detail()
        );

        let mut log = self.log.lock().await;
        log.append_row(&entry.to_row())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_logic::{FeeTier, MemorySink};
    use ethers::types::{H256, U256};

    fn entry(outcome: ExecutionOutcome, fee_quote: Option<FeeQuote>) -> LogEntry {
        LogEntry {
            label: "distribute".to_string(),
            batch_index: 0,
            batch_size: 100,
            method: "multiSendToken".to_string(),
            fee_quote,
            outcome,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_rows_follow_the_header() {
        let sink = MemorySink::new();
        let logger = RunLogger::new(sink.clone());
        let quote = FeeQuote::new(
            U256::from(120_000u64),
            FeeTier::Normal.default_fees(),
            QuoteSource::Estimated {
                raw: U256::from(100_000u64),
            },
        );

        logger
            .append(&entry(
                ExecutionOutcome::Success {
                    tx_hash: H256::from_low_u64_be(1),
                    gas_used: U256::from(95_000u64),
                },
                Some(quote),
            ))
            .await
            .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], RUN_LOG_HEADER.join(","));
        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields.len(), RUN_LOG_HEADER.len());
        assert_eq!(fields[5], "100000");
        assert_eq!(fields[6], "120000");
        assert_eq!(fields[7], "15000000000");
        assert_eq!(fields[9], "SUCCESS");
        assert_eq!(fields[11], "95000");
    }

    #[tokio::test]
    async fn test_missing_quote_leaves_fee_columns_empty() {
        let sink = MemorySink::new();
        let logger = RunLogger::new(sink.clone());

        logger
            .append(&entry(
                ExecutionOutcome::Failed {
                    cause: "estimation failed".to_string(),
                    tx_hash: None,
                },
                None,
            ))
            .await
            .unwrap();

        let row = sink.lines().pop().unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(&fields[5..9], &["", "", "", ""]);
        assert_eq!(fields[9], "FAILED");
        assert_eq!(fields[12], "estimation failed");
    }

    #[tokio::test]
    async fn test_clones_share_one_writer() {
        let sink = MemorySink::new();
        let logger = RunLogger::new(sink.clone());
        let other = logger.clone();
        let outcome = ExecutionOutcome::Reverted {
            reason: String::new(),
            tx_hash: None,
        };

        logger.append(&entry(outcome.clone(), None)).await.unwrap();
        other.append(&entry(outcome, None)).await.unwrap();

        assert_eq!(sink.lines().len(), 3);
    }
}
