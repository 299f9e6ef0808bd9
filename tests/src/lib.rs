//! # Fabrico Test Suite
//!
//! Flows that need more than one running node.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── replication.rs   # Followers catching up from the solo orderer
//!     └── solo_flow.rs     # Requests forwarded across the transport
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fab-tests
//! cargo test -p fab-tests integration::replication::
//! ```

pub mod integration;
