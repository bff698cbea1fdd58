//! Tree-to-tree comparison
//!
//! Compares two directory snapshots and produces a path-ordered change set.
//! Direction is fixed as old to new: an entry present only on the new side is
//! `Added`, only on the old side is `Removed`. Either side may be absent and
//! is then treated as an empty tree. Subtrees are descended with an explicit
//! work queue rather than recursion, so pathological nesting depth cannot
//! exhaust the call stack.

use crate::areas::database::Database;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use crate::errors::{GitError, Result};
use bitflags::bitflags;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct DiffFilter: u32 {
        const ADDED = 0b0001;
        const REMOVED = 0b0010;
        const MODIFIED = 0b0100;
    }
}

impl DiffFilter {
    /// Parse a status-letter string such as `"AM"` or `"ADM"`
    pub fn try_parse(s: &str) -> Option<Self> {
        let mut filter = Self::empty();

        for c in s.chars() {
            match c {
                'A' => filter |= Self::ADDED,
                'D' => filter |= Self::REMOVED,
                'M' => filter |= Self::MODIFIED,
                _ => return None,
            }
        }

        Some(filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    Added(TreeEntry),
    Removed(TreeEntry),
    Modified { old: TreeEntry, new: TreeEntry },
}

impl TreeChange {
    pub fn from_entries(old: Option<TreeEntry>, new: Option<TreeEntry>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(TreeChange::Added(new)),
            (Some(old), None) => Some(TreeChange::Removed(old)),
            (Some(old), Some(new)) if old != new => Some(TreeChange::Modified { old, new }),
            _ => None,
        }
    }

    pub fn matches_filter(&self, filter: DiffFilter) -> bool {
        match self {
            TreeChange::Added(_) => filter.contains(DiffFilter::ADDED),
            TreeChange::Removed(_) => filter.contains(DiffFilter::REMOVED),
            TreeChange::Modified { .. } => filter.contains(DiffFilter::MODIFIED),
        }
    }

    pub fn old_entry(&self) -> Option<&TreeEntry> {
        match self {
            TreeChange::Removed(entry) => Some(entry),
            TreeChange::Modified { old, .. } => Some(old),
            TreeChange::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&TreeEntry> {
        match self {
            TreeChange::Added(entry) => Some(entry),
            TreeChange::Modified { new, .. } => Some(new),
            TreeChange::Removed(_) => None,
        }
    }

    pub fn status_char(&self) -> char {
        match self {
            TreeChange::Added(_) => 'A',
            TreeChange::Removed(_) => 'D',
            TreeChange::Modified { .. } => 'M',
        }
    }
}

pub type ChangeSet = BTreeMap<PathBuf, TreeChange>;
pub type TreeEntryMap = BTreeMap<String, TreeEntry>;

#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    change_set: ChangeSet,
    /// Subtree pairs still to be compared
    pending: VecDeque<(Option<ObjectId>, Option<ObjectId>, PathBuf)>,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.change_set
    }

    pub fn changes_matching(
        &self,
        filter: DiffFilter,
    ) -> impl Iterator<Item = (&PathBuf, &TreeChange)> {
        self.change_set
            .iter()
            .filter(move |(_, change)| change.matches_filter(filter))
    }

    pub fn get_entries(&self, path: &Path) -> (Option<&TreeEntry>, Option<&TreeEntry>) {
        if let Some(change) = self.change_set.get(path) {
            (change.old_entry(), change.new_entry())
        } else {
            (None, None)
        }
    }

    /// Compare two snapshots, recording every blob-level difference under
    /// `prefix`. Commit ids are accepted on either side and peeled to their
    /// tree.
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        prefix: &Path,
    ) -> Result<()> {
        self.pending
            .push_back((old.copied(), new.copied(), prefix.to_path_buf()));

        while let Some((old, new, prefix)) = self.pending.pop_front() {
            if old == new {
                continue;
            }

            let old_tree_entries = self.inflate_oid_to_tree_entries(old.as_ref())?;
            let new_tree_entries = self.inflate_oid_to_tree_entries(new.as_ref())?;

            self.detect_removals(&old_tree_entries, &new_tree_entries, &prefix);
            self.detect_additions(&old_tree_entries, &new_tree_entries, &prefix);
        }

        Ok(())
    }

    fn inflate_oid_to_tree_entries(&self, oid: Option<&ObjectId>) -> Result<TreeEntryMap> {
        let Some(oid) = oid else {
            return Ok(BTreeMap::new());
        };

        // Peel commits down to the tree they snapshot
        let mut oid = *oid;
        loop {
            match self.database.parse_object(&oid)? {
                ObjectBox::Tree(tree) => {
                    return Ok(tree
                        .into_entries()
                        .map(|entry| (entry.name.clone(), entry))
                        .collect());
                }
                ObjectBox::Commit(commit) => oid = *commit.tree_oid(),
                ObjectBox::Blob(_) => {
                    return Err(GitError::MalformedTree(format!(
                        "object {oid} is a blob, not a tree"
                    )));
                }
            }
        }
    }

    fn detect_removals(&mut self, old: &TreeEntryMap, new: &TreeEntryMap, prefix: &Path) {
        for (name, entry) in old {
            let path = prefix.join(name);
            let other = new.get(name);

            if let Some(other) = other
                && other == entry
            {
                continue;
            }

            let subtree_a = entry.is_tree().then(|| entry.oid);
            let subtree_b = other.filter(|other| other.is_tree()).map(|other| other.oid);
            if subtree_a.is_some() || subtree_b.is_some() {
                self.pending.push_back((subtree_a, subtree_b, path.clone()));
            }

            let blob_a = (!entry.is_tree()).then(|| entry.clone());
            let blob_b = match other {
                Some(other) if !other.is_tree() => Some(other.clone()),
                _ => None,
            };

            if let Some(change) = TreeChange::from_entries(blob_a, blob_b) {
                self.change_set.insert(path, change);
            }
        }
    }

    fn detect_additions(&mut self, old: &TreeEntryMap, new: &TreeEntryMap, prefix: &Path) {
        for (name, entry) in new {
            let path = prefix.join(name);
            if old.contains_key(name) {
                continue; // handled by the removal pass
            }

            if entry.is_tree() {
                self.pending.push_back((None, Some(entry.oid), path));
            } else {
                self.change_set.insert(path, TreeChange::Added(entry.clone()));
            }
        }
    }
}
