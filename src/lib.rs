//! Native access to git object storage
//!
//! Reads and writes the object database of an existing repository without
//! shelling out: loose objects, pack files (including delta chains and both
//! index versions), refs and HEAD, plus history traversal and tree diffing
//! on top.
//!
//! ```no_run
//! use rawgit::areas::repository::Repository;
//! use rawgit::artifacts::log::rev_walk::WalkOptions;
//! use std::path::Path;
//!
//! # fn main() -> rawgit::errors::Result<()> {
//! let repository = Repository::open(Path::new("."))?;
//! for item in repository.walk("HEAD", WalkOptions::new().count(10))? {
//!     let (oid, commit) = item?;
//!     println!("{} {}", oid.to_short_oid(), commit.short_message());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Everything is synchronous and single-threaded; `Repository` and
//! `Database` are deliberately not `Sync`.

pub mod areas;
pub mod artifacts;
pub mod errors;

pub use areas::database::Database;
pub use areas::repository::Repository;
pub use artifacts::diff::tree_diff::{DiffFilter, TreeChange, TreeDiff};
pub use artifacts::log::rev_walk::{RevWalk, WalkOptions};
pub use artifacts::objects::object_id::ObjectId;
pub use errors::{GitError, Result};
