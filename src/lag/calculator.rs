/// Value of [`PartitionTailInfo::last_enqueued_offset`] for a partition that never received an event.
pub const EMPTY_PARTITION_OFFSET: i64 = -1;

/// Snapshot of the tail (most recently enqueued event) of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionTailInfo {
    pub last_enqueued_sequence_number: i64,
    /// [`EMPTY_PARTITION_OFFSET`] if the partition is empty.
    pub last_enqueued_offset: i64,
}

impl PartitionTailInfo {
    pub fn is_empty(&self) -> bool {
        self.last_enqueued_offset == EMPTY_PARTITION_OFFSET
    }
}

/// The last position a reader group recorded as processed, for a partition.
///
/// A reader group that never checkpointed a partition has no [`CheckpointState`] at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckpointState {
    pub sequence_number: Option<i64>,
    pub offset: Option<String>,
}

impl CheckpointState {
    /// `true` if the checkpoint points at a consumed event.
    fn has_offset(&self) -> bool {
        self.offset.as_deref().is_some_and(|o| !o.is_empty())
    }
}

/// Compute how many events of a partition a reader group has not processed yet.
///
/// Sequence numbers live in a ring of `i64::MAX` values: once exhausted, they wrap around.
/// When the tail sequence number appears behind the checkpoint, the ring is assumed to have
/// wrapped and lag is `(i64::MAX - tail) + checkpoint`.
///
/// Intermediate values are computed in `i128`, so the result is exact and never overflows:
/// it is then clamped to `[0, u64::MAX]`. With exact arithmetic the wrapped formula can't go
/// negative, so the floor at `0` only guards the invariant `lag >= 0`.
///
/// A checkpoint with an offset but without a sequence number is incomplete: lag is `0`.
///
/// # Arguments
///
/// * `tail` - Latest state of the partition
/// * `checkpoint` - Latest checkpoint of the reader group for the partition, if any
pub fn compute_lag(tail: &PartitionTailInfo, checkpoint: Option<&CheckpointState>) -> u64 {
    if tail.is_empty() {
        return 0;
    }

    let tail_seq = tail.last_enqueued_sequence_number as i128;

    let checkpoint = match checkpoint {
        Some(c) if c.has_offset() => c,
        // Nothing consumed yet: sequence numbers start at 0, so every event is unprocessed
        _ => return clamp(tail_seq + 1),
    };

    let checkpoint_seq = match checkpoint.sequence_number {
        Some(s) => s as i128,
        None => return 0,
    };

    if tail_seq >= checkpoint_seq {
        clamp(tail_seq - checkpoint_seq)
    } else {
        clamp((i64::MAX as i128 - tail_seq) + checkpoint_seq)
    }
}

fn clamp(lag: i128) -> u64 {
    lag.clamp(0, u64::MAX as i128) as u64
}

#[cfg(test)]
mod test {
    use super::*;

    fn tail(seq: i64, offset: i64) -> PartitionTailInfo {
        PartitionTailInfo {
            last_enqueued_sequence_number: seq,
            last_enqueued_offset: offset,
        }
    }

    fn checkpoint(seq: i64, offset: &str) -> CheckpointState {
        CheckpointState {
            sequence_number: Some(seq),
            offset: Some(offset.to_string()),
        }
    }

    #[test]
    fn lag_is_difference_when_tail_ahead() {
        assert_eq!(compute_lag(&tail(100, 500), Some(&checkpoint(90, "450"))), 10);
        assert_eq!(compute_lag(&tail(90, 450), Some(&checkpoint(90, "450"))), 0);

        for (t, c) in [(0, 0), (1, 0), (1_000, 1), (i64::MAX, 0), (i64::MAX, i64::MAX - 7)] {
            assert_eq!(compute_lag(&tail(t, 10), Some(&checkpoint(c, "1"))), (t - c) as u64);
        }
    }

    #[test]
    fn empty_partition_has_no_lag() {
        assert_eq!(compute_lag(&tail(42, EMPTY_PARTITION_OFFSET), Some(&checkpoint(999_999, "1"))), 0);
        assert_eq!(compute_lag(&tail(42, EMPTY_PARTITION_OFFSET), None), 0);
        assert_eq!(compute_lag(&tail(-1, EMPTY_PARTITION_OFFSET), Some(&checkpoint(i64::MAX, "1"))), 0);
    }

    #[test]
    fn never_checkpointed_lags_by_whole_partition() {
        assert_eq!(compute_lag(&tail(5, 5), None), 6);
        assert_eq!(compute_lag(&tail(0, 0), None), 1);
        assert_eq!(compute_lag(&tail(i64::MAX, 0), None), i64::MAX as u64 + 1);

        let unset_offset = CheckpointState {
            sequence_number: Some(3),
            offset: None,
        };
        assert_eq!(compute_lag(&tail(5, 5), Some(&unset_offset)), 6);
        assert_eq!(compute_lag(&tail(5, 5), Some(&checkpoint(3, ""))), 6);
        assert_eq!(compute_lag(&tail(5, 5), Some(&CheckpointState::default())), 6);
    }

    #[test]
    fn wrapped_ring_lag() {
        assert_eq!(
            compute_lag(&tail(5, 5), Some(&checkpoint(10, "100"))),
            (i64::MAX - 5) as u64 + 10
        );
        assert_eq!(
            compute_lag(&tail(i64::MAX - 1, 5), Some(&checkpoint(i64::MAX, "100"))),
            1 + i64::MAX as u64
        );
    }

    #[test]
    fn wrapped_ring_lag_stays_in_range() {
        assert_eq!(compute_lag(&tail(-10, 5), Some(&checkpoint(-5, "1"))), i64::MAX as u64 + 5);
        assert_eq!(compute_lag(&tail(i64::MIN, 5), Some(&checkpoint(i64::MIN + 1, "1"))), i64::MAX as u64 + 1);
        assert_eq!(compute_lag(&tail(i64::MIN, 5), Some(&checkpoint(i64::MAX, "1"))), u64::MAX);
        assert_eq!(compute_lag(&tail(i64::MAX, 5), Some(&checkpoint(i64::MIN, "1"))), u64::MAX);
    }

    #[test]
    fn incomplete_checkpoint_has_no_lag() {
        let no_seq = CheckpointState {
            sequence_number: None,
            offset: Some("12".to_string()),
        };
        assert_eq!(compute_lag(&tail(100, 500), Some(&no_seq)), 0);
    }
}
