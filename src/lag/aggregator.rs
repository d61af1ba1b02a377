use std::sync::Arc;

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, HistogramVec, IntCounterVec, IntGaugeVec, Registry,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::calculator::compute_lag;
use super::errors::LookupResult;
use super::sources::{CheckpointSource, PartitionTailSource};
use crate::prometheus_metrics::{LABEL_PARTITION, LABEL_READER_GROUP};

const MET_LOOKUP_NAME: &str = "partition_lookup_time_seconds";
const MET_LOOKUP_HELP: &str = "Time (s) taken to fetch tail and checkpoint of a partition, and compute its lag";
const MET_FAILURES_NAME: &str = "partition_lookup_failures_total";
const MET_FAILURES_HELP: &str = "Partition lookups that failed, and were reported with a lag of 0";
const MET_LAG_NAME: &str = "consumer_group_partition_lag";
const MET_LAG_HELP: &str = "Events enqueued to a partition, not yet checkpointed by the consumer group";

/// A reader (consumer) group, paired with the partitions it reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderGroupPartitions {
    pub reader_group: String,
    pub partitions: Vec<String>,
}

/// Lag of a reader group on a partition, measured during one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LagRecord {
    pub reader_group: String,
    pub partition_id: String,
    pub lag: u64,
}

impl LagRecord {
    pub fn new(reader_group: String, partition_id: String, lag: u64) -> Self {
        Self {
            reader_group,
            partition_id,
            lag,
        }
    }
}

/// Computes the lag of every (reader group, partition) pair, concurrently.
///
/// Lookups are isolated from each other: a pair whose lookup fails is logged
/// and reported with a lag of `0`, while the rest of the batch carries on.
pub struct LagAggregator {
    tails: Arc<dyn PartitionTailSource>,
    checkpoints: Arc<dyn CheckpointSource>,
    lookup_permits: Arc<Semaphore>,

    // Prometheus Metrics
    metric_lookup: HistogramVec,
    metric_failures: IntCounterVec,
    metric_lag: IntGaugeVec,
}

impl LagAggregator {
    /// Create a new [`LagAggregator`].
    ///
    /// # Arguments
    ///
    /// * `tails` - Where to fetch the tail of each partition from
    /// * `checkpoints` - Where to fetch the checkpoint of each (reader group, partition) pair from
    /// * `max_concurrent_lookups` - How many pairs can be looked up at the same time
    /// * `metrics` - Registry to register the aggregator metrics with
    pub fn new(
        tails: Arc<dyn PartitionTailSource>,
        checkpoints: Arc<dyn CheckpointSource>,
        max_concurrent_lookups: usize,
        metrics: Arc<Registry>,
    ) -> Self {
        Self {
            tails,
            checkpoints,
            lookup_permits: Arc::new(Semaphore::new(max_concurrent_lookups)),
            metric_lookup: register_histogram_vec_with_registry!(
                MET_LOOKUP_NAME,
                MET_LOOKUP_HELP,
                &[LABEL_READER_GROUP, LABEL_PARTITION],
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_LOOKUP_NAME}': {e}")),
            metric_failures: register_int_counter_vec_with_registry!(
                MET_FAILURES_NAME,
                MET_FAILURES_HELP,
                &[LABEL_READER_GROUP, LABEL_PARTITION],
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_FAILURES_NAME}': {e}")),
            metric_lag: register_int_gauge_vec_with_registry!(
                MET_LAG_NAME,
                MET_LAG_HELP,
                &[LABEL_READER_GROUP, LABEL_PARTITION],
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_LAG_NAME}': {e}")),
        }
    }

    /// Compute the [`LagRecord`] of every partition of every reader group.
    ///
    /// Returns once all lookups are done, with one record per pair, sorted by partition id.
    /// Pairs with the same partition id keep the order in which reader groups were given.
    pub async fn compute_all(&self, topology: &[ReaderGroupPartitions]) -> Vec<LagRecord> {
        // One slot per pair, indexed by ordinal: lookups complete in any order
        let mut records = topology
            .iter()
            .flat_map(|rgp| {
                rgp.partitions.iter().map(|p| LagRecord::new(rgp.reader_group.clone(), p.clone(), 0))
            })
            .collect::<Vec<LagRecord>>();

        let mut lookups = JoinSet::new();
        for (ordinal, record) in records.iter().enumerate() {
            let tails = self.tails.clone();
            let checkpoints = self.checkpoints.clone();
            let permits = self.lookup_permits.clone();
            let metric_lookup =
                self.metric_lookup.with_label_values(&[&record.reader_group, &record.partition_id]);
            let reader_group = record.reader_group.clone();
            let partition_id = record.partition_id.clone();

            lookups.spawn(async move {
                // The semaphore is never closed: if it ever were, lookups would just be unbounded
                let _permit = permits.acquire_owned().await.ok();

                let timer = metric_lookup.start_timer();
                let res =
                    lag_in_partition(tails.as_ref(), checkpoints.as_ref(), &reader_group, &partition_id)
                        .await;
                timer.observe_duration();

                (ordinal, res)
            });
        }

        // A task that panicked never reports its ordinal
        let mut reported = vec![false; records.len()];
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((ordinal, Ok(lag))) => {
                    reported[ordinal] = true;
                    records[ordinal].lag = lag;
                },
                Ok((ordinal, Err(e))) => {
                    reported[ordinal] = true;
                    let r = &records[ordinal];
                    error!(
                        "Failed to compute lag of Consumer Group '{}' for Partition '{}': {e}",
                        r.reader_group, r.partition_id
                    );
                    self.metric_failures.with_label_values(&[&r.reader_group, &r.partition_id]).inc();
                },
                Err(e) => {
                    warn!("Partition lookup task did not complete: {e}");
                },
            }
        }

        for r in records.iter().zip(reported).filter(|(_, reported)| !reported).map(|(r, _)| r) {
            error!(
                "Lookup of Consumer Group '{}' for Partition '{}' did not complete: reporting lag 0",
                r.reader_group, r.partition_id
            );
            self.metric_failures.with_label_values(&[&r.reader_group, &r.partition_id]).inc();
        }

        for r in records.iter() {
            self.metric_lag
                .with_label_values(&[&r.reader_group, &r.partition_id])
                .set(i64::try_from(r.lag).unwrap_or(i64::MAX));
        }

        // Stable: ties keep their ordinal order
        records.sort_by(|a, b| a.partition_id.cmp(&b.partition_id));
        records
    }
}

async fn lag_in_partition(
    tails: &dyn PartitionTailSource,
    checkpoints: &dyn CheckpointSource,
    reader_group: &str,
    partition_id: &str,
) -> LookupResult<u64> {
    let tail = tails.fetch_tail(reader_group, partition_id).await?;
    if tail.is_empty() {
        debug!("Partition '{partition_id}' is empty: no lag for Consumer Group '{reader_group}'");
        return Ok(0);
    }

    let checkpoint = checkpoints.fetch_checkpoint(reader_group, partition_id).await?;
    let lag = compute_lag(&tail, checkpoint.as_ref());

    debug!(
        "Consumer Group '{reader_group}' on Partition '{partition_id}': tail={:?} checkpoint={:?} lag={lag}",
        tail, checkpoint
    );
    Ok(lag)
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use prometheus::Registry;
    use tokio::time::{sleep, Duration};

    use super::{LagAggregator, LagRecord, ReaderGroupPartitions};
    use crate::lag::calculator::{CheckpointState, PartitionTailInfo, EMPTY_PARTITION_OFFSET};
    use crate::lag::errors::{LookupError, LookupResult};
    use crate::lag::sources::{CheckpointSource, PartitionTailSource};

    /// Tail of each partition (same for every reader group), with an optional lookup delay.
    #[derive(Default)]
    pub(crate) struct FakeTails {
        pub tails: HashMap<String, PartitionTailInfo>,
        pub delays_ms: HashMap<String, u64>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl FakeTails {
        pub(crate) fn with(tails: &[(&str, i64, i64)]) -> Self {
            Self {
                tails: tails
                    .iter()
                    .map(|(p, seq, offset)| {
                        (
                            p.to_string(),
                            PartitionTailInfo {
                                last_enqueued_sequence_number: *seq,
                                last_enqueued_offset: *offset,
                            },
                        )
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PartitionTailSource for FakeTails {
        async fn fetch_tail(&self, _reader_group: &str, partition_id: &str) -> LookupResult<PartitionTailInfo> {
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

            if partition_id == "panic" {
                panic!("lookup of partition '{partition_id}' exploded");
            }
            if let Some(ms) = self.delays_ms.get(partition_id) {
                sleep(Duration::from_millis(*ms)).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.tails
                .get(partition_id)
                .copied()
                .ok_or_else(|| LookupError::UnexpectedStatus(format!("fake://{partition_id}"), 404))
        }
    }

    /// Checkpoints by (reader group, partition): missing pairs were never checkpointed.
    #[derive(Default)]
    pub(crate) struct FakeCheckpoints {
        pub checkpoints: HashMap<(String, String), CheckpointState>,
        pub failing: Vec<(String, String)>,
        pub fetched: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl FakeCheckpoints {
        pub(crate) fn with(checkpoints: &[(&str, &str, i64, &str)]) -> Self {
            Self {
                checkpoints: checkpoints
                    .iter()
                    .map(|(g, p, seq, offset)| {
                        (
                            (g.to_string(), p.to_string()),
                            CheckpointState {
                                sequence_number: Some(*seq),
                                offset: Some(offset.to_string()),
                            },
                        )
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CheckpointSource for FakeCheckpoints {
        async fn fetch_checkpoint(
            &self,
            reader_group: &str,
            partition_id: &str,
        ) -> LookupResult<Option<CheckpointState>> {
            let k = (reader_group.to_string(), partition_id.to_string());
            self.fetched.lock().unwrap().push(k.clone());
            if self.failing.contains(&k) {
                return Err(LookupError::UnexpectedStatus(format!("fake://{reader_group}/{partition_id}"), 503));
            }
            Ok(self.checkpoints.get(&k).cloned())
        }
    }

    pub(crate) fn topology(groups: &[(&str, &[&str])]) -> Vec<ReaderGroupPartitions> {
        groups
            .iter()
            .map(|(g, ps)| ReaderGroupPartitions {
                reader_group: g.to_string(),
                partitions: ps.iter().map(|p| p.to_string()).collect(),
            })
            .collect()
    }

    fn aggregator(tails: Arc<FakeTails>, checkpoints: FakeCheckpoints, max_concurrent: usize) -> LagAggregator {
        LagAggregator::new(tails, Arc::new(checkpoints), max_concurrent, Arc::new(Registry::new()))
    }

    fn failures(aggregator: &LagAggregator, g: &str, p: &str) -> u64 {
        aggregator.metric_failures.with_label_values(&[g, p]).get()
    }

    fn record(g: &str, p: &str, lag: u64) -> LagRecord {
        LagRecord::new(g.to_string(), p.to_string(), lag)
    }

    #[tokio::test]
    async fn sorted_by_partition_regardless_of_completion_order() {
        let mut tails = FakeTails::with(&[("0", 13, 100), ("1", 11, 100), ("2", 12, 100)]);
        // "0" completes last, "2" first
        tails.delays_ms = HashMap::from([("0".to_string(), 60), ("1".to_string(), 30), ("2".to_string(), 0)]);
        let checkpoints = FakeCheckpoints::with(&[("g", "0", 10, "1"), ("g", "1", 10, "1"), ("g", "2", 10, "1")]);

        let records = aggregator(Arc::new(tails), checkpoints, 8)
            .compute_all(&topology(&[("g", &["2", "0", "1"])]))
            .await;

        assert_eq!(records, vec![record("g", "0", 3), record("g", "1", 1), record("g", "2", 2)]);
    }

    #[tokio::test]
    async fn failed_lookups_are_reported_as_zero() {
        let tails = FakeTails::with(&[("0", 100, 500), ("1", 100, 500)]);
        let mut checkpoints = FakeCheckpoints::with(&[("a", "0", 90, "450"), ("a", "1", 95, "480")]);
        checkpoints.failing.push(("a".to_string(), "1".to_string()));

        let agg = aggregator(Arc::new(tails), checkpoints, 8);
        // Partition "9" has no tail: the fake fails its lookup
        let records = agg.compute_all(&topology(&[("a", &["0", "1", "9"])])).await;

        assert_eq!(records, vec![record("a", "0", 10), record("a", "1", 0), record("a", "9", 0)]);
        assert_eq!(failures(&agg, "a", "0"), 0);
        assert_eq!(failures(&agg, "a", "1"), 1);
        assert_eq!(failures(&agg, "a", "9"), 1);
    }

    #[tokio::test]
    async fn empty_partition_checkpoint_is_not_fetched() {
        let tails = FakeTails::with(&[("0", 100, 500), ("1", 42, EMPTY_PARTITION_OFFSET)]);
        let checkpoints = Arc::new(FakeCheckpoints::with(&[("a", "0", 90, "450"), ("a", "1", 999_999, "1")]));

        let agg = LagAggregator::new(Arc::new(tails), checkpoints.clone(), 8, Arc::new(Registry::new()));
        let records = agg.compute_all(&topology(&[("a", &["0", "1"])])).await;

        assert_eq!(records, vec![record("a", "0", 10), record("a", "1", 0)]);
        assert_eq!(*checkpoints.fetched.lock().unwrap(), vec![("a".to_string(), "0".to_string())]);
    }

    #[tokio::test]
    async fn panicked_lookup_is_reported_as_zero() {
        let tails = FakeTails::with(&[("0", 5, 5)]);

        let agg = aggregator(Arc::new(tails), FakeCheckpoints::default(), 8);
        let records = agg.compute_all(&topology(&[("a", &["panic", "0"])])).await;

        assert_eq!(records, vec![record("a", "0", 6), record("a", "panic", 0)]);
        assert_eq!(failures(&agg, "a", "panic"), 1);
        assert_eq!(failures(&agg, "a", "0"), 0);
    }

    #[tokio::test]
    async fn every_group_and_partition_is_measured() {
        let tails = FakeTails::with(&[("0", 100, 500), ("1", 42, EMPTY_PARTITION_OFFSET)]);
        let checkpoints = FakeCheckpoints::with(&[
            ("a", "0", 90, "450"),
            ("a", "1", 999_999, "1"),
            ("b", "0", 99, "499"),
        ]);

        let records = aggregator(Arc::new(tails), checkpoints, 8)
            .compute_all(&topology(&[("b", &["0", "1"]), ("a", &["0", "1"])]))
            .await;

        // Same partition: reader groups keep the given order
        assert_eq!(
            records,
            vec![record("b", "0", 1), record("a", "0", 10), record("b", "1", 0), record("a", "1", 0)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_lookups_are_bounded() {
        let partitions = ["0", "1", "2", "3", "4", "5"];
        let mut tails = FakeTails::with(&partitions.map(|p| (p, 1, 1)));
        tails.delays_ms = partitions.iter().map(|p| (p.to_string(), 20)).collect();
        let tails = Arc::new(tails);

        let records = aggregator(tails.clone(), FakeCheckpoints::default(), 2)
            .compute_all(&topology(&[("g", &partitions)]))
            .await;

        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.lag == 2));
        assert!(tails.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_topology() {
        let records = aggregator(Arc::new(FakeTails::default()), FakeCheckpoints::default(), 1)
            .compute_all(&[])
            .await;
        assert!(records.is_empty());
    }
}
