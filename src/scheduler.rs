use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Histogram, IntCounter, Registry,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::lag::{LagAggregator, ReaderGroupPartitions};
use crate::monitor::{MetricPublisher, PublishError, PublishOutcome};

const MET_CYCLE_NAME: &str = "poll_cycle_time_seconds";
const MET_CYCLE_HELP: &str = "Time (s) taken by a poll cycle, from the first lookup to the publish response";
const MET_FAILED_NAME: &str = "poll_cycle_failures_total";
const MET_FAILED_HELP: &str = "Poll cycles that did not get the lag metric published";

/// Possible reasons for a poll cycle to fail.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Failed to publish: {0}")]
    Publish(#[from] PublishError),

    #[error("Publish rejected with status {status}: {body}")]
    Rejected {
        status: u16,
        body: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    /// Terminal.
    Stopped,
}

/// Drives the poll cycles: measure lag, publish it, wait, repeat.
///
/// Cycles run strictly one after the other. A failing cycle is logged and counted,
/// and the next one runs as scheduled: the scheduler stops only when cancelled.
pub struct PollScheduler {
    topology: Vec<ReaderGroupPartitions>,
    aggregator: LagAggregator,
    publisher: MetricPublisher,
    interval: Duration,
    stopped: AtomicBool,

    // Prometheus Metrics
    metric_cycle: Histogram,
    metric_failed: IntCounter,
}

impl PollScheduler {
    /// Create a new [`PollScheduler`].
    ///
    /// # Arguments
    ///
    /// * `topology` - Reader groups, and their partitions, measured at every cycle
    /// * `aggregator` - Measures the lag of every (reader group, partition) pair
    /// * `publisher` - Publishes the lag measured by each cycle
    /// * `interval` - Wait between the end of a cycle and the start of the next
    /// * `metrics` - Registry to register the scheduler metrics with
    pub fn new(
        topology: Vec<ReaderGroupPartitions>,
        aggregator: LagAggregator,
        publisher: MetricPublisher,
        interval: Duration,
        metrics: Arc<Registry>,
    ) -> Self {
        Self {
            topology,
            aggregator,
            publisher,
            interval,
            stopped: AtomicBool::new(false),
            metric_cycle: register_histogram_with_registry!(MET_CYCLE_NAME, MET_CYCLE_HELP, metrics)
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_CYCLE_NAME}': {e}")),
            metric_failed: register_int_counter_with_registry!(MET_FAILED_NAME, MET_FAILED_HELP, metrics)
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_FAILED_NAME}': {e}")),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.stopped.load(Ordering::SeqCst) {
            SchedulerState::Stopped
        } else {
            SchedulerState::Running
        }
    }

    /// Spawn a new async task running [`Self::run`].
    ///
    /// # Arguments
    ///
    /// * `shutdown_token`: A [`CancellationToken`] that, when cancelled, will make the internal loop terminate.
    pub fn spawn(self: Arc<Self>, shutdown_token: CancellationToken) -> JoinHandle<SchedulerState> {
        tokio::spawn(async move { self.run(shutdown_token).await })
    }

    /// Run poll cycles until `shutdown_token` is cancelled.
    ///
    /// Cancellation is observed before each cycle and while waiting for the next one,
    /// never in the middle of a cycle.
    pub async fn run(&self, shutdown_token: CancellationToken) -> SchedulerState {
        let pairs: usize = self.topology.iter().map(|rgp| rgp.partitions.len()).sum();
        let mut cycle: u64 = 0;

        while self.state() == SchedulerState::Running {
            if shutdown_token.is_cancelled() {
                break;
            }

            cycle += 1;
            info!("Cycle {cycle}: measuring lag of {pairs} Consumer Group Partitions");

            let timer = self.metric_cycle.start_timer();
            match self.run_cycle().await {
                Ok(outcome) => {
                    info!("Cycle {cycle}: published lag metric (status {})", outcome.status);
                },
                Err(e) => {
                    self.metric_failed.inc();
                    error!("Cycle {cycle} failed: {e}");
                },
            }
            timer.observe_duration();

            tokio::select! {
                _ = sleep(self.interval) => {},
                _ = shutdown_token.cancelled() => break,
            }
        }

        info!("Shutting down");
        self.stopped.store(true, Ordering::SeqCst);
        SchedulerState::Stopped
    }

    async fn run_cycle(&self) -> Result<PublishOutcome, CycleError> {
        let records = self.aggregator.compute_all(&self.topology).await;
        trace!("Measured lag: {:?}", records);

        let outcome = self.publisher.publish(&records).await?;
        if !outcome.is_success() {
            return Err(CycleError::Rejected {
                status: outcome.status,
                body: outcome.body,
            });
        }

        Ok(outcome)
    }
}
