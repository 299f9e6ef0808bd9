//! Port implementations that connect the consensus application to the
//! peer transport.

pub mod block_source;
pub mod peer_directory;

pub use block_source::TransportBlockSource;
pub use peer_directory::TransportPeerDirectory;
