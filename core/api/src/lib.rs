// core/api/src/lib.rs

pub mod cache;
pub mod metrics;
pub mod rosetta;
pub mod server;
pub mod services;

pub use server::{offline_router, online_router, ApiError};

/// Rosetta specification version this server conforms to.
pub const ROSETTA_API_VERSION: &str = "1.4.10";
