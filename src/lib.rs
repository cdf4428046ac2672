pub mod bridge;
pub mod clients;
pub mod codec;
pub mod config;
pub mod context;
pub mod hashes;
pub mod logging;
pub mod model;
pub mod platform;
pub mod transaction;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
