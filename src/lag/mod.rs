// Inner modules
mod aggregator;
mod calculator;
mod errors;
mod sources;

use std::sync::Arc;

use prometheus::Registry;

// Exports
pub use aggregator::{LagAggregator, LagRecord, ReaderGroupPartitions};
pub use calculator::{CheckpointState, PartitionTailInfo};
pub use errors::{LookupError, LookupResult};
pub use sources::{CheckpointSource, PartitionTailSource};

#[cfg(test)]
pub(crate) use aggregator::test::{topology, FakeCheckpoints, FakeTails};

pub fn init(
    tails: Arc<dyn PartitionTailSource>,
    checkpoints: Arc<dyn CheckpointSource>,
    max_concurrent_lookups: usize,
    metrics: Arc<Registry>,
) -> LagAggregator {
    let aggregator = LagAggregator::new(tails, checkpoints, max_concurrent_lookups, metrics);

    debug!("Initialized");
    aggregator
}
