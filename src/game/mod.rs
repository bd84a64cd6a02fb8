//! Proximity engine, elimination rules and the service both request surfaces share

pub mod broadcast;
pub mod elimination;
pub mod error;
pub mod proximity;
pub mod service;
pub mod snapshot;

pub use broadcast::BroadcastScheduler;
pub use error::GameError;
pub use service::TeamService;
