//! Long-running node tasks.

pub mod delivery;
pub mod follower;
pub mod solo;

pub use delivery::DeliveryMonitor;
pub use follower::{run_follower, FollowerHandler};
pub use solo::SoloOrderer;
