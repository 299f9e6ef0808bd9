//! Ledger configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Committed batches waiting for aggregation before `add` applies backpressure.
    pub aggregation_queue: usize,
    /// Aggregation faults retained for inspection.
    pub fault_history: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            aggregation_queue: 1024,
            fault_history: 256,
        }
    }
}

impl LedgerConfig {
    /// Small queue so tests exercise backpressure.
    pub fn for_testing() -> Self {
        Self {
            aggregation_queue: 4,
            fault_history: 16,
        }
    }
}
