pub mod errors;
pub mod messages;
pub mod peer;
