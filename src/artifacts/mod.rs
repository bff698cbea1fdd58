//! Data structures and algorithms
//!
//! - `objects`: the object model (ids, blobs, trees, commits)
//! - `log`: commit history traversal
//! - `diff`: tree snapshot comparison

pub mod diff;
pub mod log;
pub mod objects;
