use crate::traits::Workload;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

pub struct WorkerRunner;

impl WorkerRunner {
    /// Spawns each workload as its own task under a shared cancellation
    /// token (fired by Ctrl+C) and returns every result in input order.
    pub async fn run_workloads<W>(
        workloads: Vec<W>,
    ) -> Vec<(String, Result<W::Report, W::Error>)>
    where
        W: Workload + 'static,
    {
        let token = CancellationToken::new();
        let ctrl_c_token = token.clone();

        let listener = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("🛑 Received Ctrl+C. Finishing the in-flight batch, then stopping...");
                    ctrl_c_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        let results = Self::run_with_token(workloads, token).await;
        listener.abort();
        results
    }

    /// Same as [`run_workloads`](Self::run_workloads) with a caller-owned token.
    pub async fn run_with_token<W>(
        workloads: Vec<W>,
        token: CancellationToken,
    ) -> Vec<(String, Result<W::Report, W::Error>)>
    where
        W: Workload + 'static,
    {
        let start_time = std::time::Instant::now();
        info!("Starting {} workload(s)...", workloads.len());

        let mut set = JoinSet::new();
        let names: Vec<String> = workloads.iter().map(|w| w.name().to_string()).collect();

        for (index, workload) in workloads.into_iter().enumerate() {
            let span = tracing::info_span!("workload", name = %names[index]);
            let child_token = token.clone();
            set.spawn(
                async move {
                    let result = workload.run(child_token).await;
                    if let Err(e) = &result {
                        error!("Workload {} aborted: {}", workload.name(), e);
                    }
                    (index, result)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<Result<W::Report, W::Error>>> =
            names.iter().map(|_| None).collect();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!("A workload task panicked or failed to join: {:?}", e),
            }
        }

        info!(
            "All workloads finished in {:.1}s",
            start_time.elapsed().as_secs_f64()
        );

        names
            .into_iter()
            .zip(slots)
            .filter_map(|(name, slot)| slot.map(|result| (name, result)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    struct Sleeper {
        name: String,
        fail: bool,
    }

    #[async_trait]
    impl Workload for Sleeper {
        type Report = usize;
        type Error = Boom;

        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, cancel: CancellationToken) -> Result<usize, Boom> {
            let mut steps = 0;
            while !cancel.is_cancelled() && steps < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                steps += 1;
            }
            if self.fail {
                Err(Boom)
            } else {
                Ok(steps)
            }
        }
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let workloads = vec![
            Sleeper {
                name: "a".to_string(),
                fail: false,
            },
            Sleeper {
                name: "b".to_string(),
                fail: true,
            },
        ];

        let results = WorkerRunner::run_with_token(workloads, CancellationToken::new()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
        assert_eq!(*results[0].1.as_ref().unwrap(), 3);
        assert!(results[1].1.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_between_steps() {
        let token = CancellationToken::new();
        token.cancel();
        let results = WorkerRunner::run_with_token(
            vec![Sleeper {
                name: "c".to_string(),
                fail: false,
            }],
            token,
        )
        .await;
        assert_eq!(*results[0].1.as_ref().unwrap(), 0);
    }
}
