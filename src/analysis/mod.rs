//! Aggregation of parsed records into report tallies.

pub mod aggregator;

pub use aggregator::*;
