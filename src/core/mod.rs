pub mod distributed;
pub mod error;
pub mod graph;
pub mod partitioned;
pub mod serialization;
pub mod similarity;
pub mod types;
