pub mod medoids;

pub use medoids::{BalancedKMedoidsPartitioner, PartitionerConfig};
