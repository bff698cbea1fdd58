//! Object model: typed records over raw store bytes
//!
//! Everything in the store is one of three immutable object kinds, addressed
//! by the SHA-1 of `<type> <size>\0<content>`:
//!
//! - **Blob**: opaque file content
//! - **Tree**: directory listing (modes, names, object ids)
//! - **Commit**: tree pointer plus ancestry and metadata
//!
//! Decoding interprets raw payload bytes as structured records; encoding
//! produces the canonical payload bytes the hash contract is defined over.

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;
