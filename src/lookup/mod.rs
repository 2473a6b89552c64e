//! Pending feature lookups built up during a session.

pub mod accumulator;

pub use accumulator::{FeatureLookupAccumulator, FeatureLookupEntry, NewEntry};
