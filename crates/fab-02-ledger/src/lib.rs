//! # Ledger Subsystem (fab-02)
//!
//! Append-only log of committed batches plus two indices derived from it:
//! which node originated each file, and how many parts each node may still
//! fabricate from it.
//!
//! ## Locking
//!
//! The commit log and the derived indices sit behind independent locks.
//! [`Ledger::add`] appends under the log lock and hands the batch to a
//! bounded queue; a single aggregation worker folds batches into the indices
//! in commit order. Index readers may briefly lag the log; the lag is visible
//! through [`Ledger::aggregated_position`] and [`Ledger::wait_for_aggregation`].
//!
//! ## Aggregation rules
//!
//! | Request | Effect |
//! |---------|--------|
//! | `SystemReserved` | none |
//! | `AddFile` | register origin; first writer wins |
//! | `AllowFabrication` | add `count` to the node's remaining parts |
//! | `AnnounceFabrication` / `CancelFabrication` | fault: not implemented |
//!
//! A failing request is recorded as an [`AggregationFault`] and logged; the
//! remaining requests of its batch are still applied.

pub mod config;
pub mod domain;
pub mod service;

pub use config::LedgerConfig;
pub use domain::aggregates::{
    AggregateSnapshot, Aggregates, AggregationFault, Allowance, AvailableFile,
};
pub use domain::errors::{AggregationError, LedgerError, LedgerResult};
pub use domain::log::CommitLog;
pub use service::{Ledger, LedgerStatus};
