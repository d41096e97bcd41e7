use std::fmt;
use std::time::Duration;

use tracing::{error, info, instrument, warn, Instrument};

use crate::domain::job::{JobResult, JobStatus};
use crate::ports::routine::Routine;

/// Counts of a finished batch by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub no_data: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[JobResult]) -> Self {
        results
            .iter()
            .fold(BatchSummary::default(), |mut summary, result| {
                match result.status {
                    JobStatus::Success => summary.succeeded += 1,
                    JobStatus::NoData => summary.no_data += 1,
                    JobStatus::Error => summary.failed += 1,
                }
                summary
            })
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} without data, {} failed",
            self.succeeded, self.no_data, self.failed
        )
    }
}

/// Runs routines one after another. A routine's outcome never stops the ones
/// after it.
pub struct BatchRunner {
    routines: Vec<Box<dyn Routine>>,
    inter_job_delay: Duration,
}

impl BatchRunner {
    pub fn new(routines: Vec<Box<dyn Routine>>, inter_job_delay: Duration) -> Self {
        Self {
            routines,
            inter_job_delay,
        }
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    pub fn routine_names(&self) -> Vec<&str> {
        self.routines.iter().map(|routine| routine.name()).collect()
    }

    /// Results in routine order.
    #[instrument(skip(self), fields(len = self.routines.len()))]
    pub async fn run_all(&self) -> Vec<JobResult> {
        info!("Running {} routines sequentially", self.routines.len());

        let mut results = Vec::with_capacity(self.routines.len());
        for (index, routine) in self.routines.iter().enumerate() {
            if index > 0 && !self.inter_job_delay.is_zero() {
                tokio::time::sleep(self.inter_job_delay).await;
            }

            let result = routine
                .run()
                .instrument(tracing::span!(
                    tracing::Level::INFO,
                    "routine",
                    routine = routine.name(),
                    index = index,
                    len = self.routines.len()
                ))
                .await;

            match result.status {
                JobStatus::Success => info!("✅ {}: {}", result.job, result.message),
                JobStatus::NoData => warn!("⚠️ {}: no data, {}", result.job, result.message),
                JobStatus::Error => error!("❌ {}: {}", result.job, result.message),
            }

            results.push(result);
        }

        info!("🏁 Batch finished: {}", BatchSummary::from_results(&results));
        results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct FixedRoutine {
        result: JobResult,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Routine for FixedRoutine {
        fn name(&self) -> &str {
            &self.result.job
        }

        async fn run(&self) -> JobResult {
            self.calls.lock().unwrap().push(self.result.job.clone());
            self.result.clone()
        }
    }

    fn routines(results: Vec<JobResult>, calls: &Arc<Mutex<Vec<String>>>) -> Vec<Box<dyn Routine>> {
        results
            .into_iter()
            .map(|result| {
                Box::new(FixedRoutine {
                    result,
                    calls: calls.clone(),
                }) as Box<dyn Routine>
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_stop_batch() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = BatchRunner::new(
            routines(
                vec![
                    JobResult::error("FSE", "Failed to read source data"),
                    JobResult::no_data("Vendor", "no rows matched the filter"),
                    JobResult::success("Rejoin", 4),
                ],
                &calls,
            ),
            Duration::from_millis(1000),
        );

        let results = runner.run_all().await;

        assert_eq!(*calls.lock().unwrap(), vec!["FSE", "Vendor", "Rejoin"]);
        assert_eq!(
            results.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![JobStatus::Error, JobStatus::NoData, JobStatus::Success]
        );
        assert_eq!(
            BatchSummary::from_results(&results),
            BatchSummary {
                succeeded: 1,
                no_data: 1,
                failed: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_routines_only() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = BatchRunner::new(
            routines(
                vec![JobResult::success("a", 1), JobResult::success("b", 1)],
                &calls,
            ),
            Duration::from_millis(1000),
        );

        let started = tokio::time::Instant::now();
        runner.run_all().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = BatchRunner::new(Vec::new(), Duration::ZERO);
        assert!(runner.is_empty());
        assert!(runner.run_all().await.is_empty());
    }

    #[test]
    fn test_summary_display() {
        let summary = BatchSummary {
            succeeded: 5,
            no_data: 2,
            failed: 1,
        };
        assert_eq!(summary.to_string(), "5 succeeded, 2 without data, 1 failed");
    }
}
