use async_trait::async_trait;

use super::calculator::{CheckpointState, PartitionTailInfo};
use super::errors::LookupResult;

/// Provides the current tail of the partitions of the stream.
#[async_trait]
pub trait PartitionTailSource: Send + Sync {
    /// Fetch the tail of `partition_id`, as seen by `reader_group`.
    async fn fetch_tail(&self, reader_group: &str, partition_id: &str) -> LookupResult<PartitionTailInfo>;
}

/// Provides the checkpoints recorded by reader groups.
#[async_trait]
pub trait CheckpointSource: Send + Sync {
    /// Fetch the checkpoint of `reader_group` for `partition_id`.
    ///
    /// `Ok(None)` means the reader group never checkpointed the partition.
    async fn fetch_checkpoint(
        &self,
        reader_group: &str,
        partition_id: &str,
    ) -> LookupResult<Option<CheckpointState>>;
}
