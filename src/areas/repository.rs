//! Repository aggregate
//!
//! Owns the object database and the ref store rooted at a `.git` directory
//! and ties the two together for history queries.

use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::log::rev_walk::{RevWalk, WalkOptions};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GitError, Result};
use std::path::Path;

pub struct Repository {
    path: Box<Path>,
    database: Database,
    refs: Refs,
}

impl Repository {
    /// Open the repository whose worktree is at `path`; the `.git` directory
    /// must already exist
    pub fn open(path: &Path) -> Result<Self> {
        let path = path.canonicalize()?;
        let git_dir = path.join(".git");
        if !git_dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no repository at {}", path.display()),
            )
            .into());
        }

        Ok(Self::at_git_dir(&git_dir, &path))
    }

    /// Open a bare repository, `path` being the git directory itself
    pub fn open_bare(path: &Path) -> Result<Self> {
        let path = path.canonicalize()?;
        Ok(Self::at_git_dir(&path, &path))
    }

    fn at_git_dir(git_dir: &Path, worktree: &Path) -> Self {
        let database = Database::new(git_dir.join("objects").into_boxed_path());
        let refs = Refs::new(git_dir.to_path_buf().into_boxed_path());

        Repository {
            path: worktree.to_path_buf().into_boxed_path(),
            database,
            refs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// The commit HEAD points at, if any ref has been written yet
    pub fn head_oid(&self) -> Result<Option<ObjectId>> {
        self.refs.read_head()
    }

    /// Resolve a revision string (hex id, `HEAD`, branch, remote or tag name)
    pub fn revparse(&self, revision: &str) -> Result<ObjectId> {
        self.refs
            .revparse(revision)?
            .ok_or_else(|| GitError::InvalidRef {
                name: revision.to_string(),
                reason: "no such revision".to_string(),
            })
    }

    /// Walk history from a revision with the given options
    pub fn walk(&self, revision: &str, options: WalkOptions) -> Result<RevWalk<'_>> {
        let start = self.revparse(revision)?;
        Ok(RevWalk::new(&self.database, start, options))
    }
}
