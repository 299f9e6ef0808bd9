//! # Consensus Application Subsystem (fab-03)
//!
//! Everything an external BFT engine needs from the application: proposal
//! assembly and verification, request admission, signing and signature
//! verification, delivery of committed proposals into the ledger, and state
//! synchronization from peers.
//!
//! The engine is a plugged-in collaborator. It drives [`FabricationApp`]
//! through the [`ConsensusApplication`] port; the app reaches the network only
//! through the [`PeerDirectory`] and [`BlockSource`] ports.
//!
//! ## Delivery
//!
//! `deliver` is the finality boundary. For each committed proposal it decodes
//! the batch and position, refuses a sequence that does not advance (a fatal
//! consensus violation), appends to the ledger, remembers the decision for
//! sync replies, publishes the record to the bounded delivery queue (waiting
//! when full), and reports any membership change carried in the batch.
//! Aggregation happens on the ledger's worker and cannot fail delivery.
//!
//! ## Errors
//!
//! [`AppError::is_fatal`] separates consensus invariant violations, which must
//! halt the node, from verification failures the engine treats as rejections.

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::AppConfig;
pub use domain::errors::{AppError, AppResult};
pub use ports::inbound::ConsensusApplication;
pub use ports::outbound::{BlockSource, PeerDirectory, RecordReplay};
pub use service::{AppDependencies, AppStatus, FabricationApp};
