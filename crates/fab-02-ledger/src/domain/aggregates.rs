//! Derived indices: file origins and fabrication allowances.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use shared_types::{ContentHash, FileClaim, NodeId, Position, Request, RequestInfo, RequestType};

use super::errors::AggregationError;

/// Remaining parts a node may fabricate from one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub node: NodeId,
    pub remaining: u64,
}

/// A file a node may currently fabricate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableFile {
    pub hash: ContentHash,
    /// `None` if the allowance was committed before the file was registered.
    pub origin: Option<NodeId>,
    pub remaining: u64,
}

/// A committed request that could not be aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationFault {
    pub position: Position,
    /// `None` when the request bytes did not decode.
    pub request: Option<RequestInfo>,
    pub error: AggregationError,
}

/// Comparable copy of both indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub files: BTreeMap<ContentHash, NodeId>,
    pub allowances: BTreeMap<ContentHash, Vec<Allowance>>,
}

/// FileIndex and AllowanceIndex plus the fault history.
#[derive(Debug, Default)]
pub struct Aggregates {
    files: HashMap<ContentHash, NodeId>,
    allowances: HashMap<ContentHash, Vec<Allowance>>,
    faults: VecDeque<AggregationFault>,
    fault_history: usize,
}

impl Aggregates {
    pub fn new(fault_history: usize) -> Self {
        Self {
            fault_history,
            ..Self::default()
        }
    }

    /// Folds one committed request into the indices.
    pub fn apply(&mut self, request: &Request) -> Result<(), AggregationError> {
        match request.request_type {
            RequestType::SystemReserved => Ok(()),
            RequestType::AddFile => {
                let claim = Self::claim(request)?;
                match self.files.get(&claim.hash) {
                    Some(existing) if *existing == claim.node => Ok(()),
                    Some(existing) => Err(AggregationError::OriginConflict {
                        hash: claim.hash,
                        existing: *existing,
                        claimed: claim.node,
                    }),
                    None => {
                        self.files.insert(claim.hash, claim.node);
                        Ok(())
                    }
                }
            }
            RequestType::AllowFabrication => {
                let claim = Self::claim(request)?;
                let entries = self.allowances.entry(claim.hash).or_default();
                match entries.iter_mut().find(|a| a.node == claim.node) {
                    Some(allowance) => {
                        allowance.remaining = allowance
                            .remaining
                            .checked_add(request.count)
                            .ok_or(AggregationError::AllowanceOverflow {
                                hash: claim.hash,
                                node: claim.node,
                            })?;
                    }
                    None => entries.push(Allowance {
                        node: claim.node,
                        remaining: request.count,
                    }),
                }
                Ok(())
            }
            other @ (RequestType::AnnounceFabrication | RequestType::CancelFabrication) => {
                Err(AggregationError::NotImplemented(other))
            }
        }
    }

    fn claim(request: &Request) -> Result<FileClaim, AggregationError> {
        FileClaim::from_payload(&request.payload).map_err(|reason| {
            AggregationError::MalformedPayload {
                request_type: request.request_type,
                reason,
            }
        })
    }

    /// Keeps at most `fault_history` faults, dropping the oldest.
    pub fn record_fault(&mut self, fault: AggregationFault) {
        if self.fault_history == 0 {
            return;
        }
        while self.faults.len() >= self.fault_history {
            self.faults.pop_front();
        }
        self.faults.push_back(fault);
    }

    pub fn file_origin(&self, hash: &ContentHash) -> Option<NodeId> {
        self.files.get(hash).copied()
    }

    pub fn known_file_count(&self) -> usize {
        self.files.len()
    }

    /// Remaining parts for `(hash, node)`; zero when no allowance exists.
    pub fn remaining(&self, hash: &ContentHash, node: NodeId) -> u64 {
        self.allowances
            .get(hash)
            .and_then(|entries| entries.iter().find(|a| a.node == node))
            .map_or(0, |a| a.remaining)
    }

    pub fn allowances(&self, hash: &ContentHash) -> Vec<Allowance> {
        self.allowances.get(hash).cloned().unwrap_or_default()
    }

    /// Files with a positive allowance for `node`, ordered by hash.
    pub fn available_for(&self, node: NodeId) -> Vec<AvailableFile> {
        let mut files: Vec<AvailableFile> = self
            .allowances
            .iter()
            .filter_map(|(hash, entries)| {
                let allowance = entries.iter().find(|a| a.node == node && a.remaining > 0)?;
                Some(AvailableFile {
                    hash: *hash,
                    origin: self.file_origin(hash),
                    remaining: allowance.remaining,
                })
            })
            .collect();
        files.sort_by(|a, b| a.hash.cmp(&b.hash));
        files
    }

    pub fn faults(&self) -> Vec<AggregationFault> {
        self.faults.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            files: self.files.iter().map(|(h, n)| (*h, *n)).collect(),
            allowances: self
                .allowances
                .iter()
                .map(|(h, entries)| (*h, entries.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(tag: &[u8]) -> ContentHash {
        ContentHash::of(tag)
    }

    #[test]
    fn test_allowance_accumulates() {
        let mut agg = Aggregates::new(8);
        let h = hash(b"gear");
        agg.apply(&Request::allow_fabrication("c", "1", h, NodeId(5), 3))
            .unwrap();
        agg.apply(&Request::allow_fabrication("c", "2", h, NodeId(5), 2))
            .unwrap();
        assert_eq!(agg.remaining(&h, NodeId(5)), 5);
        assert_eq!(agg.allowances(&h).len(), 1);
    }

    #[test]
    fn test_allowances_per_node() {
        let mut agg = Aggregates::new(8);
        let h = hash(b"gear");
        agg.apply(&Request::allow_fabrication("c", "1", h, NodeId(1), 3))
            .unwrap();
        agg.apply(&Request::allow_fabrication("c", "2", h, NodeId(2), 7))
            .unwrap();
        assert_eq!(agg.remaining(&h, NodeId(1)), 3);
        assert_eq!(agg.remaining(&h, NodeId(2)), 7);
        assert_eq!(agg.remaining(&h, NodeId(3)), 0);
        assert_eq!(agg.remaining(&hash(b"other"), NodeId(1)), 0);
    }

    #[test]
    fn test_first_origin_wins() {
        let mut agg = Aggregates::new(8);
        let h = hash(b"housing");
        agg.apply(&Request::add_file("c", "1", h, NodeId(1))).unwrap();
        // Same origin again is harmless.
        agg.apply(&Request::add_file("c", "2", h, NodeId(1))).unwrap();

        let err = agg
            .apply(&Request::add_file("c", "3", h, NodeId(2)))
            .unwrap_err();
        assert_eq!(
            err,
            AggregationError::OriginConflict {
                hash: h,
                existing: NodeId(1),
                claimed: NodeId(2)
            }
        );
        assert_eq!(agg.file_origin(&h), Some(NodeId(1)));
    }

    #[test]
    fn test_reserved_types_not_implemented() {
        let mut agg = Aggregates::new(8);
        let mut request = Request::add_file("c", "1", hash(b"x"), NodeId(1));
        request.request_type = RequestType::CancelFabrication;
        assert_eq!(
            agg.apply(&request),
            Err(AggregationError::NotImplemented(
                RequestType::CancelFabrication
            ))
        );
        assert_eq!(agg.known_file_count(), 0);
    }

    #[test]
    fn test_overflow_leaves_entry_unchanged() {
        let mut agg = Aggregates::new(8);
        let h = hash(b"x");
        agg.apply(&Request::allow_fabrication("c", "1", h, NodeId(1), u64::MAX - 1))
            .unwrap();
        let err = agg
            .apply(&Request::allow_fabrication("c", "2", h, NodeId(1), 2))
            .unwrap_err();
        assert!(matches!(err, AggregationError::AllowanceOverflow { .. }));
        assert_eq!(agg.remaining(&h, NodeId(1)), u64::MAX - 1);
    }

    #[test]
    fn test_short_payload_rejected() {
        let mut agg = Aggregates::new(8);
        let mut request = Request::add_file("c", "1", hash(b"x"), NodeId(1));
        request.payload.truncate(64);
        assert!(matches!(
            agg.apply(&request),
            Err(AggregationError::MalformedPayload {
                request_type: RequestType::AddFile,
                ..
            })
        ));
    }

    #[test]
    fn test_available_for_skips_exhausted() {
        let mut agg = Aggregates::new(8);
        let a = hash(b"a");
        let b = hash(b"b");
        agg.apply(&Request::add_file("c", "1", a, NodeId(9))).unwrap();
        agg.apply(&Request::allow_fabrication("c", "2", a, NodeId(1), 2))
            .unwrap();
        agg.apply(&Request::allow_fabrication("c", "3", b, NodeId(1), 0))
            .unwrap();

        let available = agg.available_for(NodeId(1));
        assert_eq!(
            available,
            vec![AvailableFile {
                hash: a,
                origin: Some(NodeId(9)),
                remaining: 2
            }]
        );
        assert!(agg.available_for(NodeId(2)).is_empty());
    }

    #[test]
    fn test_fault_history_is_bounded() {
        let mut agg = Aggregates::new(2);
        for seq in 1..=3 {
            agg.record_fault(AggregationFault {
                position: Position::new(0, seq),
                request: None,
                error: AggregationError::NotImplemented(RequestType::AnnounceFabrication),
            });
        }
        let faults = agg.faults();
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].position, Position::new(0, 2));
    }
}
