//! Consumer of the delivered-record queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{LedgerRecord, Position, Request};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Drains delivered records, logging every request they carry.
#[derive(Debug, Default)]
pub struct DeliveryMonitor {
    records: AtomicU64,
    requests: AtomicU64,
    last: Mutex<Position>,
}

impl DeliveryMonitor {
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn last_position(&self) -> Position {
        *self.last.lock()
    }

    pub fn observe(&self, record: &LedgerRecord) {
        let position = Position::from_bytes(&record.metadata).unwrap_or_default();
        for raw in &record.batch.requests {
            match Request::from_bytes(raw) {
                Ok(request) => info!(
                    "[fab-node] 📦 {} {} committed at {}",
                    request.request_type,
                    request.info(),
                    position
                ),
                Err(e) => warn!("[fab-node] Undecodable request at {}: {}", position, e),
            }
        }
        self.requests
            .fetch_add(record.batch.requests.len() as u64, Ordering::Relaxed);
        self.records.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = position;
    }

    /// Consumes `records` until shutdown or until the app drops its sender.
    pub async fn run(
        self: Arc<Self>,
        mut records: mpsc::Receiver<LedgerRecord>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                record = records.recv() => match record {
                    Some(record) => self.observe(&record),
                    None => break,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Batch, ContentHash, NodeId};

    #[test]
    fn test_observe_counts_requests() {
        let monitor = DeliveryMonitor::default();
        let requests = [
            Request::add_file("api", "1", ContentHash::of(b"a"), NodeId(1)),
            Request::allow_fabrication("api", "2", ContentHash::of(b"a"), NodeId(2), 4),
        ];
        let record = LedgerRecord {
            metadata: Position::new(0, 3).to_bytes().unwrap(),
            batch: Batch::from_requests(&requests).unwrap(),
        };

        monitor.observe(&record);
        assert_eq!(monitor.records(), 1);
        assert_eq!(monitor.requests(), 2);
        assert_eq!(monitor.last_position(), Position::new(0, 3));
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let monitor = Arc::new(DeliveryMonitor::default());
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&monitor).run(rx, shutdown));

        tx.send(LedgerRecord {
            metadata: Position::new(0, 1).to_bytes().unwrap(),
            batch: Batch::default(),
        })
        .await
        .unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(monitor.records(), 1);
        assert_eq!(monitor.requests(), 0);
    }
}
