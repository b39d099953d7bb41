//! Schema module - Configuration, record and dataset types for hill-climbing runs.

mod config;
mod dataset;
mod evolution;
mod network;

pub use config::*;
pub use dataset::*;
pub use evolution::*;
pub use network::*;
