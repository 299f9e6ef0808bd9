//! Consensus application configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capacity of the delivered-record queue; delivery waits when it is full.
    pub delivery_queue: usize,
    /// Verification sequence at startup.
    pub initial_verification_sequence: u64,
    /// Largest encoded request admitted by `verify_request`.
    pub request_max_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            delivery_queue: 100,
            initial_verification_sequence: 0,
            request_max_bytes: 10 * 1024,
        }
    }
}

impl AppConfig {
    pub fn for_testing() -> Self {
        Self {
            delivery_queue: 8,
            ..Self::default()
        }
    }
}
