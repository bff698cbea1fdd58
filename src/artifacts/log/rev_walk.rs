//! History traversal
//!
//! Walks commit ancestry depth-first, visiting the parents of each commit
//! before emitting the commit itself, so ancestors come out ahead of their
//! descendants along every branch. The walk uses an explicit frame stack, so
//! history depth never translates into call-stack depth.
//!
//! Revisiting a commit reachable through several ancestry paths is the normal
//! mode; `WalkOptions::dedup` switches on a visited set for callers that want
//! each commit at most once. Filters gate emission, not descent: a commit
//! outside the date window still has its parents walked.
//!
//! A storage error while loading a commit is yielded as an `Err` item and
//! abandons that commit's subtree only; siblings and pending descendants keep
//! going.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use crate::errors::{GitError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Traversal and emission controls for [`RevWalk`]
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    since: Option<chrono::DateTime<chrono::FixedOffset>>,
    until: Option<chrono::DateTime<chrono::FixedOffset>>,
    count: Option<usize>,
    first_parent: bool,
    path_limiter: Option<PathBuf>,
    dedup: bool,
}

impl WalkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit only commits committed at or after this instant
    pub fn since(mut self, since: chrono::DateTime<chrono::FixedOffset>) -> Self {
        self.since = Some(since);
        self
    }

    /// Emit only commits committed strictly before this instant
    pub fn until(mut self, until: chrono::DateTime<chrono::FixedOffset>) -> Self {
        self.until = Some(until);
        self
    }

    /// Bound the number of commits walked along each branch, not globally
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Follow only the first parent of merges
    pub fn first_parent(mut self) -> Self {
        self.first_parent = true;
        self
    }

    /// Emit only commits where this path's entry differs from every parent
    pub fn path_limiter(mut self, path: impl Into<PathBuf>) -> Self {
        self.path_limiter = Some(path.into());
        self
    }

    /// Emit each commit at most once, whatever its number of ancestry paths
    pub fn dedup(mut self) -> Self {
        self.dedup = true;
        self
    }
}

/// One commit on the walk stack
///
/// `commit` is `None` until the first visit loads it; it is then held until
/// the frame's parents have been walked and the commit can be emitted.
struct Frame {
    oid: ObjectId,
    /// Commits still allowed on this branch, this one included
    budget: usize,
    commit: Option<Commit>,
}

pub struct RevWalk<'r> {
    database: &'r Database,
    stack: Vec<Frame>,
    visited: HashSet<ObjectId>,
    options: WalkOptions,
}

impl<'r> RevWalk<'r> {
    pub fn new(database: &'r Database, start: ObjectId, options: WalkOptions) -> Self {
        let budget = options.count.unwrap_or(usize::MAX);
        let stack = if budget == 0 {
            Vec::new()
        } else {
            vec![Frame {
                oid: start,
                budget,
                commit: None,
            }]
        };

        RevWalk {
            database,
            stack,
            visited: HashSet::new(),
            options,
        }
    }

    /// First visit of a frame: load the commit and schedule its parents
    fn expand(&mut self) -> Option<GitError> {
        let frame = self.stack.last_mut().expect("expand with empty stack");

        let commit = match self.database.parse_object_as_commit(&frame.oid) {
            Ok(Some(commit)) => commit,
            Ok(None) => {
                let err = GitError::MalformedCommit(format!("{} is not a commit", frame.oid));
                self.stack.pop();
                return Some(err);
            }
            Err(err) => {
                self.stack.pop();
                return Some(err);
            }
        };

        let budget = frame.budget;
        let parents: Vec<ObjectId> = if self.options.first_parent {
            commit.parent().into_iter().copied().collect()
        } else {
            commit.parents().to_vec()
        };
        frame.commit = Some(commit);

        if budget > 1 {
            // Reverse push order so the first parent's subtree is walked first
            for parent in parents.into_iter().rev() {
                if self.options.dedup && self.visited.contains(&parent) {
                    continue;
                }
                self.stack.push(Frame {
                    oid: parent,
                    budget: budget - 1,
                    commit: None,
                });
            }
        }

        None
    }

    fn passes_date_window(&self, commit: &Commit) -> bool {
        let timestamp = commit.timestamp();
        if let Some(since) = self.options.since
            && timestamp < since
        {
            return false;
        }
        if let Some(until) = self.options.until
            && timestamp >= until
        {
            return false;
        }
        true
    }

    /// Whether the limited path differs between this commit's tree and every
    /// parent's tree. A root commit is compared against the empty tree.
    fn passes_path_limiter(&self, commit: &Commit) -> Result<bool> {
        let Some(path) = self.options.path_limiter.as_deref() else {
            return Ok(true);
        };

        let entry = self.entry_at(commit.tree_oid(), path)?;

        if commit.parents().is_empty() {
            // Against the empty tree, only presence counts as a change
            return Ok(entry.is_some());
        }

        for parent_oid in commit.parents() {
            let parent = self
                .database
                .parse_object_as_commit(parent_oid)?
                .ok_or_else(|| {
                    GitError::MalformedCommit(format!("parent {parent_oid} is not a commit"))
                })?;
            let parent_entry = self.entry_at(parent.tree_oid(), path)?;

            if parent_entry == entry {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Resolve the entry a slash path points at within a tree snapshot
    fn entry_at(&self, tree_oid: &ObjectId, path: &Path) -> Result<Option<TreeEntry>> {
        let mut tree = match self.database.parse_object_as_tree(tree_oid)? {
            Some(tree) => tree,
            None => {
                return Err(GitError::MalformedTree(format!(
                    "object {tree_oid} is not a tree"
                )));
            }
        };

        let mut components = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .peekable();

        while let Some(component) = components.next() {
            let Some(entry) = tree.entry(&component).cloned() else {
                return Ok(None);
            };

            if components.peek().is_none() {
                return Ok(Some(entry));
            }
            if !entry.is_tree() {
                return Ok(None); // a blob cannot contain the rest of the path
            }

            tree = self
                .database
                .parse_object_as_tree(&entry.oid)?
                .ok_or_else(|| {
                    GitError::MalformedTree(format!("object {} is not a tree", entry.oid))
                })?;
        }

        Ok(None)
    }
}

impl Iterator for RevWalk<'_> {
    type Item = Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last()?;

            if frame.commit.is_none() {
                if self.options.dedup && !self.visited.insert(frame.oid) {
                    self.stack.pop();
                    continue;
                }
                if let Some(err) = self.expand() {
                    return Some(Err(err));
                }
                continue;
            }

            // Parents are done; the frame is ready to emit
            let frame = self.stack.pop().expect("frame checked above");
            let commit = frame.commit.expect("loaded frame");

            if !self.passes_date_window(&commit) {
                continue;
            }
            match self.passes_path_limiter(&commit) {
                Ok(true) => return Some(Ok((frame.oid, commit))),
                Ok(false) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
