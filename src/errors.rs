//! Error taxonomy for the object store and traversal layers
//!
//! Absence and corruption are distinct conditions everywhere: a missing id is
//! `NotFound` (recoverable, the caller decides), while content that fails its
//! self-check is `CorruptObject` and is never retried. Structural damage to a
//! pack or its index is `CorruptPack` and disables that pack only.

use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitError>;

#[derive(Debug, Error)]
pub enum GitError {
    /// The id is absent from every backend, after the pack-directory rescan.
    #[error("object {0} not found")]
    NotFound(ObjectId),

    /// The stored bytes do not decode or re-hash to the requested id.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Structural violation in a pack or its index, including delta-base
    /// cycles. Fatal for that pack; other packs keep serving.
    #[error("corrupt pack {pack}: {reason}")]
    CorruptPack { pack: PathBuf, reason: String },

    #[error("malformed commit: {0}")]
    MalformedCommit(String),

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid ref {name}: {reason}")]
    InvalidRef { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    pub(crate) fn corrupt_object(id: &ObjectId, reason: impl Into<String>) -> Self {
        GitError::CorruptObject {
            id: *id,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_pack(pack: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GitError::CorruptPack {
            pack: pack.into(),
            reason: reason.into(),
        }
    }
}
