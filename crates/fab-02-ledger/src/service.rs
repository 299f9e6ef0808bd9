//! Ledger service: commit path plus the aggregation worker.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shared_types::{Batch, ContentHash, LedgerRecord, NodeId, Position, Request};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::config::LedgerConfig;
use crate::domain::aggregates::{
    AggregateSnapshot, Aggregates, AggregationFault, Allowance, AvailableFile,
};
use crate::domain::errors::{AggregationError, LedgerError, LedgerResult};
use crate::domain::log::CommitLog;

/// Point-in-time ledger summary for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    pub latest: Position,
    pub aggregated: Position,
    pub records: usize,
    pub known_files: usize,
    pub faults: usize,
}

struct AggregationJob {
    position: Position,
    batch: Batch,
}

/// The ledger. Shared as `Arc<Ledger>` between the consensus adapter and the
/// transport's replay server.
pub struct Ledger {
    log: RwLock<CommitLog>,
    aggregates: Arc<Mutex<Aggregates>>,
    queue: mpsc::Sender<AggregationJob>,
    progress: watch::Receiver<Position>,
    queue_capacity: usize,
}

impl Ledger {
    /// Creates an empty ledger and spawns its aggregation worker on the
    /// current Tokio runtime. The worker exits when the ledger is dropped.
    pub fn start(config: LedgerConfig) -> Arc<Self> {
        let queue_capacity = config.aggregation_queue.max(1);
        let (queue, jobs) = mpsc::channel(queue_capacity);
        let (progress_tx, progress) = watch::channel(Position::default());
        let aggregates = Arc::new(Mutex::new(Aggregates::new(config.fault_history)));

        tokio::spawn(run_aggregation(jobs, Arc::clone(&aggregates), progress_tx));
        info!(
            "[fab-02] Ledger started (aggregation queue {})",
            queue_capacity
        );

        Arc::new(Self {
            log: RwLock::new(CommitLog::new()),
            aggregates,
            queue,
            progress,
            queue_capacity,
        })
    }

    /// Appends a committed record.
    ///
    /// Returns `Ok(false)` without side effects when the record does not
    /// advance the log (duplicate or stale delivery). Accepted records are
    /// queued for aggregation after the log lock is released; this waits for
    /// queue capacity.
    pub async fn add(&self, record: LedgerRecord) -> LedgerResult<bool> {
        let position =
            Position::from_bytes(&record.metadata).map_err(LedgerError::MalformedMetadata)?;
        let batch = record.batch.clone();

        let accepted = self.log.write().append(position, record);
        if !accepted {
            debug!("[fab-02] Ignoring record at {} (not after latest)", position);
            return Ok(false);
        }
        debug!(
            "[fab-02] Committed {} ({} requests)",
            position,
            batch.requests.len()
        );

        self.queue
            .send(AggregationJob { position, batch })
            .await
            .map_err(|_| LedgerError::AggregatorStopped)?;
        Ok(true)
    }

    /// Records strictly after `from`, in commit order.
    pub fn read_all(&self, from: Position) -> Vec<LedgerRecord> {
        self.log.read().read_after(from)
    }

    pub fn latest_position(&self) -> Position {
        self.log.read().latest()
    }

    pub fn record_count(&self) -> usize {
        self.log.read().len()
    }

    /// Position of the last batch folded into the indices.
    pub fn aggregated_position(&self) -> Position {
        *self.progress.borrow()
    }

    /// Batches committed but not yet aggregated.
    pub fn aggregation_backlog(&self) -> usize {
        self.queue_capacity - self.queue.capacity()
    }

    /// Resolves once every batch up to `target` has been aggregated.
    pub async fn wait_for_aggregation(&self, target: Position) -> LedgerResult<()> {
        let mut progress = self.progress.clone();
        progress
            .wait_for(|aggregated| *aggregated >= target)
            .await
            .map(|_| ())
            .map_err(|_| LedgerError::AggregatorStopped)
    }

    pub fn file_origin(&self, hash: &ContentHash) -> Option<NodeId> {
        self.aggregates.lock().file_origin(hash)
    }

    pub fn known_file_count(&self) -> usize {
        self.aggregates.lock().known_file_count()
    }

    pub fn remaining(&self, hash: &ContentHash, node: NodeId) -> u64 {
        self.aggregates.lock().remaining(hash, node)
    }

    pub fn allowances(&self, hash: &ContentHash) -> Vec<Allowance> {
        self.aggregates.lock().allowances(hash)
    }

    pub fn available_for(&self, node: NodeId) -> Vec<AvailableFile> {
        self.aggregates.lock().available_for(node)
    }

    pub fn faults(&self) -> Vec<AggregationFault> {
        self.aggregates.lock().faults()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.aggregates.lock().snapshot()
    }

    pub fn status(&self) -> LedgerStatus {
        let (latest, records) = {
            let log = self.log.read();
            (log.latest(), log.len())
        };
        let aggregates = self.aggregates.lock();
        LedgerStatus {
            latest,
            aggregated: self.aggregated_position(),
            records,
            known_files: aggregates.known_file_count(),
            faults: aggregates.faults().len(),
        }
    }
}

async fn run_aggregation(
    mut jobs: mpsc::Receiver<AggregationJob>,
    aggregates: Arc<Mutex<Aggregates>>,
    progress: watch::Sender<Position>,
) {
    while let Some(job) = jobs.recv().await {
        {
            let mut aggregates = aggregates.lock();
            for raw in &job.batch.requests {
                aggregate_one(&mut aggregates, job.position, raw);
            }
        }
        progress.send_replace(job.position);
    }
    debug!("[fab-02] Aggregation worker stopped");
}

fn aggregate_one(aggregates: &mut Aggregates, position: Position, raw: &[u8]) {
    let (request, result) = match Request::from_bytes(raw) {
        Ok(request) => {
            let result = aggregates.apply(&request);
            (Some(request), result)
        }
        Err(e) => (None, Err(AggregationError::MalformedRequest(e))),
    };

    if let Err(error) = result {
        let info = request.map(|r| r.info());
        error!(
            "[fab-02] ❌ Aggregation fault at {} ({}): {}",
            position,
            info.as_ref()
                .map_or_else(|| "undecodable".to_string(), ToString::to_string),
            error
        );
        aggregates.record_fault(AggregationFault {
            position,
            request: info,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::RequestType;

    fn record(seq: u64, requests: &[Request]) -> LedgerRecord {
        record_at(Position::new(0, seq), requests)
    }

    fn record_at(position: Position, requests: &[Request]) -> LedgerRecord {
        LedgerRecord {
            metadata: position.to_bytes().unwrap(),
            batch: Batch::from_requests(requests).unwrap(),
        }
    }

    fn hash(tag: &[u8]) -> ContentHash {
        ContentHash::of(tag)
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        let rec = record(1, &[Request::add_file("c", "1", hash(b"f"), NodeId(1))]);

        assert!(ledger.add(rec.clone()).await.unwrap());
        let before = ledger.read_all(Position::default());
        assert!(!ledger.add(rec).await.unwrap());
        assert_eq!(ledger.read_all(Position::default()), before);
        assert_eq!(ledger.record_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_view_rejected() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        assert!(ledger.add(record_at(Position::new(2, 5), &[])).await.unwrap());
        assert!(!ledger.add(record_at(Position::new(1, 6), &[])).await.unwrap());
        assert_eq!(ledger.latest_position(), Position::new(2, 5));
    }

    #[tokio::test]
    async fn test_malformed_metadata() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        let rec = LedgerRecord {
            metadata: vec![1, 2, 3],
            batch: Batch::default(),
        };
        assert!(matches!(
            ledger.add(rec).await,
            Err(LedgerError::MalformedMetadata(_))
        ));
        assert_eq!(ledger.record_count(), 0);
    }

    #[tokio::test]
    async fn test_read_all_after_position() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        for seq in 1..=4 {
            ledger.add(record(seq, &[])).await.unwrap();
        }
        let tail = ledger.read_all(Position::new(0, 2));
        assert_eq!(tail.len(), 2);
        assert_eq!(
            Position::from_bytes(&tail[0].metadata).unwrap(),
            Position::new(0, 3)
        );
    }

    #[tokio::test]
    async fn test_allowance_accumulation() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        let h = hash(b"bracket");
        ledger
            .add(record(1, &[Request::allow_fabrication("c", "1", h, NodeId(2), 3)]))
            .await
            .unwrap();
        ledger
            .add(record(2, &[Request::allow_fabrication("c", "2", h, NodeId(2), 2)]))
            .await
            .unwrap();

        ledger.wait_for_aggregation(Position::new(0, 2)).await.unwrap();
        assert_eq!(ledger.remaining(&h, NodeId(2)), 5);
        assert_eq!(ledger.aggregated_position(), Position::new(0, 2));
    }

    #[tokio::test]
    async fn test_fault_isolated_to_one_request() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        let h = hash(b"hinge");
        let mut announce = Request::add_file("c", "announce", h, NodeId(1));
        announce.request_type = RequestType::AnnounceFabrication;

        let mut rec = record(
            1,
            &[
                Request::add_file("c", "add", h, NodeId(1)),
                announce,
                Request::allow_fabrication("c", "allow", h, NodeId(3), 4),
            ],
        );
        rec.batch.requests.push(vec![0xde, 0xad]);
        ledger.add(rec).await.unwrap();
        ledger.wait_for_aggregation(Position::new(0, 1)).await.unwrap();

        assert_eq!(ledger.file_origin(&h), Some(NodeId(1)));
        assert_eq!(ledger.remaining(&h, NodeId(3)), 4);

        let faults = ledger.faults();
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].request.as_ref().unwrap().id, "announce");
        assert_eq!(
            faults[0].error,
            AggregationError::NotImplemented(RequestType::AnnounceFabrication)
        );
        assert!(faults[1].request.is_none());
        assert!(matches!(
            faults[1].error,
            AggregationError::MalformedRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_origin_conflict_keeps_first() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        let h = hash(b"same bytes");
        ledger
            .add(record(1, &[Request::add_file("a", "1", h, NodeId(1))]))
            .await
            .unwrap();
        ledger
            .add(record(2, &[Request::add_file("b", "1", h, NodeId(2))]))
            .await
            .unwrap();
        ledger.wait_for_aggregation(Position::new(0, 2)).await.unwrap();

        assert_eq!(ledger.file_origin(&h), Some(NodeId(1)));
        assert!(matches!(
            ledger.faults()[0].error,
            AggregationError::OriginConflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_backpressure_does_not_lose_batches() {
        let config = LedgerConfig {
            aggregation_queue: 1,
            fault_history: 4,
        };
        let ledger = Ledger::start(config);
        let h = hash(b"many");
        for seq in 1..=50 {
            ledger
                .add(record(seq, &[Request::allow_fabrication("c", &seq.to_string(), h, NodeId(1), 1)]))
                .await
                .unwrap();
        }
        ledger.wait_for_aggregation(Position::new(0, 50)).await.unwrap();
        assert_eq!(ledger.remaining(&h, NodeId(1)), 50);
        assert_eq!(ledger.aggregation_backlog(), 0);
    }

    #[tokio::test]
    async fn test_status() {
        let ledger = Ledger::start(LedgerConfig::for_testing());
        ledger
            .add(record(1, &[Request::add_file("c", "1", hash(b"s"), NodeId(1))]))
            .await
            .unwrap();
        ledger.wait_for_aggregation(Position::new(0, 1)).await.unwrap();

        let status = ledger.status();
        assert_eq!(status.records, 1);
        assert_eq!(status.latest, Position::new(0, 1));
        assert_eq!(status.aggregated, Position::new(0, 1));
        assert_eq!(status.known_files, 1);
        assert_eq!(status.faults, 0);
    }
}
