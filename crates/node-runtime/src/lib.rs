//! # Fabrico Node Runtime
//!
//! Wires the subsystems of one fabrication node together.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and the [`FabricationNode`] that owns every subsystem
//! - `adapters/` - Transport-backed implementations of the consensus app's ports
//! - `handlers/` - Solo orderer, follower loop and delivery monitor
//!
//! ## Subsystems
//!
//! 1. Content Store (fab-01) - Content-addressed blobs
//! 2. Ledger (fab-02) - Commit log and permission aggregates
//! 3. Consensus Application (fab-03) - BFT engine callbacks
//! 4. Peer Transport (fab-04) - QUIC with mutual TLS

pub mod adapters;
pub mod container;
pub mod handlers;

pub use container::{ConfigError, FabricationNode, NodeConfig, NodeError, NodeMode, NodeResult};
