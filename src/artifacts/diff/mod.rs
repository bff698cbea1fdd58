//! Snapshot comparison

pub mod tree_diff;
