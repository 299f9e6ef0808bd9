pub mod discovery;
pub mod framing;
pub mod tls;
