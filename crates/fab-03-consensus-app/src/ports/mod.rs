//! Ports for the consensus application.
//!
//! - `inbound`: the callback surface the BFT engine drives
//! - `outbound`: what the application needs from the network

pub mod inbound;
pub mod outbound;
