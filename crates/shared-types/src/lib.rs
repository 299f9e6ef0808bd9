//! # Shared Types Crate
//!
//! Domain entities exchanged between the fabrication subsystems and the
//! canonical binary codec used to put them on the wire.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here.
//! - **Canonical Encoding**: one set of `bincode` options for all encodings, so
//!   two nodes always produce identical bytes (and identical digests) for the
//!   same value.
//! - **Opaque Metadata**: proposals carry their [`Position`] as encoded bytes;
//!   decoding is explicit and fallible.

pub mod codec;
pub mod entities;
pub mod errors;

pub use codec::{decode, encode, MAX_DECODE_BYTES};
pub use entities::*;
pub use errors::*;
