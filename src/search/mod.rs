pub mod approximate;

pub use approximate::ApproximateSearch;
