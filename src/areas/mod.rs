//! Storage areas
//!
//! The on-disk surfaces of a repository:
//!
//! - `loose`: one zlib-compressed file per object
//! - `pack`: many objects in one indexed, delta-compressed file
//! - `database`: unified lookup over both backends
//! - `refs`: plain-text name-to-id pointers and HEAD
//! - `repository`: aggregate rooted at a `.git` directory

pub mod database;
pub mod loose;
pub mod pack;
pub mod refs;
pub mod repository;
