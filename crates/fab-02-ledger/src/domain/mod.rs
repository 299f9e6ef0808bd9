pub mod aggregates;
pub mod errors;
pub mod log;
