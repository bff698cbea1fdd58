//! Tree object
//!
//! Trees are directory snapshots: an ordered list of named entries pointing
//! to blobs or subtrees.
//!
//! ## Format
//!
//! Payload bytes: repeated `<mode> <name>\0<20-byte-id>` records with no
//! inter-record delimiter beyond the fixed id length. A truncated trailing
//! record is malformed.
//!
//! The canonical encoding sorts entries byte-wise by name; that ordering is
//! part of the hash contract. Decoding tolerates out-of-order entries from
//! other producers and preserves the order it read, so a sorted tree
//! re-encodes byte-identically.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{GitError, Result};
use bytes::Bytes;
use derive_new::new;
use std::io::{BufRead, Write};

/// Mode string trees use for subtree entries
pub const TREE_MODE: &str = "40000";

/// Default mode for regular file entries
pub const REGULAR_FILE_MODE: &str = "100644";

/// One named entry of a tree, pointing at a blob or a subtree
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    /// File-mode string exactly as stored (e.g. `100644`, `40000`)
    pub mode: String,
    /// Path segment
    pub name: String,
    pub oid: ObjectId,
}

impl TreeEntry {
    /// Whether this entry points at a subtree rather than a blob
    pub fn is_tree(&self) -> bool {
        self.mode.trim_start_matches('0').starts_with("40")
    }

    pub fn kind(&self) -> ObjectType {
        if self.is_tree() {
            ObjectType::Tree
        } else {
            ObjectType::Blob
        }
    }
}

/// A directory snapshot
///
/// Entries are kept in the order they were decoded (or inserted); the
/// canonical serialization sorts by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn from_entries(entries: Vec<TreeEntry>) -> Self {
        Tree { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = TreeEntry> {
        self.entries.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

impl Packable for Tree {
    fn serialize(&self) -> Result<Bytes> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        let mut payload = Vec::new();
        for entry in sorted {
            payload.write_all(entry.mode.as_bytes())?;
            payload.push(b' ');
            payload.write_all(entry.name.as_bytes())?;
            payload.push(0);
            entry.oid.write_raw_to(&mut payload)?;
        }

        Ok(Bytes::from(payload))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut entries = Vec::new();

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(GitError::MalformedTree(
                    "unexpected EOF in entry mode".to_string(),
                ));
            }

            let mode = std::str::from_utf8(&mode_bytes)
                .map_err(|_| GitError::MalformedTree("non-utf8 entry mode".to_string()))?
                .to_owned();
            if mode.is_empty() || !mode.bytes().all(|b| b.is_ascii_digit()) {
                return Err(GitError::MalformedTree(format!(
                    "invalid entry mode {mode:?}"
                )));
            }

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || name_bytes.pop() != Some(b'\0') {
                return Err(GitError::MalformedTree(
                    "unexpected EOF in entry name".to_string(),
                ));
            }
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| GitError::MalformedTree("non-utf8 entry name".to_string()))?
                .to_owned();

            let oid = ObjectId::read_raw_from(&mut reader)
                .map_err(|_| GitError::MalformedTree("unexpected EOF in entry id".to_string()))?;

            entries.push(TreeEntry::new(mode, name, oid));
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
