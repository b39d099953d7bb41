//! Compute module - Network evaluation and the evolutionary search.

mod network;

pub mod evolution;

pub use network::*;
