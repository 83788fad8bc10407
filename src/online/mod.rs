pub mod graph;

pub use graph::{OnlineConfig, OnlineGraph};
