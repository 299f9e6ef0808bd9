//! # Peer Transport Subsystem (fab-04)
//!
//! Node-to-node communication over QUIC with mutual TLS: every node presents
//! a certificate issued by the shared CA and named `node{id}`.
//!
//! ## RPC surface
//!
//! Each RPC uses one bidirectional stream of length-prefixed frames:
//!
//! | Request                | Response stream                 |
//! |------------------------|---------------------------------|
//! | `Consensus(envelope)`  | `Ack` or `Failure`              |
//! | `FetchBlocks(from)`    | `Record`* then end of stream    |
//! | `DownloadContent(h)`   | `Chunk`* (1 MiB) or `Failure`   |
//!
//! ## Delivery semantics
//!
//! Consensus traffic is at-most-once. `send_consensus` and `send_request` log
//! and drop on failure; the consensus engine's own timers recover. Dial
//! failures never reach the caller: a per-peer supervisor keeps retrying.
//!
//! Inbound envelopes go through a bounded queue drained by
//! [`PeerTransport::serve`], which routes them to a [`MessageHandler`] until
//! shutdown.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::discovery::StaticDiscoverer;
pub use adapters::framing::{read_frame, write_frame, CHUNK_SIZE, MAX_FRAME_BYTES};
pub use config::TransportConfig;
pub use domain::errors::{TransportError, TransportResult};
pub use domain::messages::{EnvelopePayload, FailureKind, PeerEnvelope, RpcRequest, RpcResponse};
pub use domain::peer::Peer;
pub use ports::inbound::MessageHandler;
pub use ports::outbound::Discoverer;
pub use service::client::{ContentStream, RecordStream};
pub use service::PeerTransport;
