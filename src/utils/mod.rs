//! Utility functions and types

pub mod cancel;
pub mod data_loader;
pub mod stats;

pub use cancel::CancellationToken;
pub use data_loader::{read_json, Dataset};
