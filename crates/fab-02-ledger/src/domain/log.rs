//! The append-only commit log.

use shared_types::{LedgerRecord, Position};

/// Committed records in commit order with their decoded positions.
#[derive(Debug, Default)]
pub struct CommitLog {
    latest: Position,
    records: Vec<(Position, LedgerRecord)>,
}

impl CommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` if `position` advances the log.
    ///
    /// A record is accepted only when its view is not behind the latest view
    /// and its sequence is strictly greater than the latest sequence.
    /// Returns `false` (and changes nothing) otherwise.
    pub fn append(&mut self, position: Position, record: LedgerRecord) -> bool {
        if position.view_id < self.latest.view_id
            || position.latest_sequence <= self.latest.latest_sequence
        {
            return false;
        }
        self.latest = position;
        self.records.push((position, record));
        true
    }

    /// Records strictly after `from`, in log order.
    pub fn read_after(&self, from: Position) -> Vec<LedgerRecord> {
        self.records
            .iter()
            .filter(|(position, _)| *position > from)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn latest(&self) -> Position {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::Batch;

    fn record(tag: u8) -> LedgerRecord {
        LedgerRecord {
            metadata: vec![tag],
            batch: Batch::default(),
        }
    }

    #[test]
    fn test_append_requires_progress() {
        let mut log = CommitLog::new();
        assert!(log.append(Position::new(0, 1), record(1)));
        assert!(!log.append(Position::new(0, 1), record(1)));
        assert!(!log.append(Position::new(1, 1), record(2)));
        assert!(log.append(Position::new(1, 2), record(3)));
        assert!(!log.append(Position::new(0, 9), record(4)));
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest(), Position::new(1, 2));
    }

    #[test]
    fn test_sequence_zero_never_accepted() {
        let mut log = CommitLog::new();
        assert!(!log.append(Position::new(0, 0), record(0)));
        assert!(log.is_empty());
    }

    #[test]
    fn test_read_after_is_strict() {
        let mut log = CommitLog::new();
        for seq in 1..=5 {
            log.append(Position::new(0, seq), record(seq as u8));
        }
        let tail = log.read_after(Position::new(0, 3));
        assert_eq!(tail, vec![record(4), record(5)]);
        assert_eq!(log.read_after(Position::new(0, 5)), vec![]);
        assert_eq!(log.read_after(Position::default()).len(), 5);
        assert_eq!(log.read_after(Position::new(1, 0)), vec![]);
    }

    proptest! {
        #[test]
        fn prop_accepted_positions_strictly_increase(
            positions in proptest::collection::vec((0u64..3, 0u64..20), 0..40)
        ) {
            let mut log = CommitLog::new();
            for (view, seq) in positions {
                log.append(Position::new(view, seq), record(0));
            }
            let accepted: Vec<Position> = log.records.iter().map(|(p, _)| *p).collect();
            prop_assert!(accepted.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(accepted.windows(2).all(|w| w[0].latest_sequence < w[1].latest_sequence));
        }

        #[test]
        fn prop_duplicate_append_is_noop(seqs in proptest::collection::vec(1u64..50, 1..20)) {
            let mut log = CommitLog::new();
            for seq in &seqs {
                log.append(Position::new(0, *seq), record(*seq as u8));
            }
            let before = log.read_after(Position::default());
            for seq in &seqs {
                log.append(Position::new(0, *seq), record(*seq as u8));
            }
            prop_assert_eq!(before, log.read_after(Position::default()));
        }
    }
}
