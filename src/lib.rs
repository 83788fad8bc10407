//! Approximate k-NN graph construction, partitioning, search, and online
//! maintenance over a caller-supplied similarity function.

pub mod brute;
pub mod core;
pub mod online;
pub mod partition;
pub mod search;

#[cfg(feature = "logging")]
mod settings;
