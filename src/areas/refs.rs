//! References: plain-text pointers from names to commit ids
//!
//! A ref file under the `refs/` hierarchy holds one 40-hex id plus a
//! trailing newline. `HEAD` holds either `ref: refs/heads/<name>` (symbolic)
//! or a direct hex id (detached). This layer resolves names to ids for
//! callers of the object store; branch porcelain lives elsewhere.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GitError, Result};
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the repository directory (typically `.git`)
    path: Box<Path>,
}

/// A ref file's content: either another ref's name or a direct id
#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef(String),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read(path: &Path) -> Result<Option<SymRefOrOid>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let symref_regex = regex::Regex::new(SYMREF_REGEX).expect("valid symref pattern");
        if let Some(symref_match) = symref_regex.captures(content) {
            Ok(Some(SymRefOrOid::SymRef(symref_match[1].to_string())))
        } else {
            let oid = ObjectId::try_parse(content).map_err(|_| GitError::InvalidRef {
                name: path.display().to_string(),
                reason: format!("neither a symref nor a 40-hex id: {content:?}"),
            })?;
            Ok(Some(SymRefOrOid::Oid(oid)))
        }
    }
}

impl Refs {
    /// Read the id HEAD ultimately points to, following symbolic refs
    pub fn read_head(&self) -> Result<Option<ObjectId>> {
        self.read_symref(&self.path.join(HEAD_REF_NAME))
    }

    /// Resolve a revision string to an id
    ///
    /// A 40-hex string passes through untouched; otherwise `HEAD` and the
    /// `refs/heads`, `refs/remotes`, `refs/tags` directories are tried in
    /// that order.
    pub fn revparse(&self, name: &str) -> Result<Option<ObjectId>> {
        if let Ok(oid) = ObjectId::try_parse(name) {
            return Ok(Some(oid));
        }
        if name == HEAD_REF_NAME {
            return self.read_head();
        }

        for ref_dir in ["heads", "remotes", "tags"] {
            let candidate = self.refs_path().join(ref_dir).join(name);
            if candidate.is_file() {
                return self.read_symref(&candidate);
            }
        }

        Ok(None)
    }

    /// Names of all refs under `refs/`, relative to the repository directory
    pub fn list_refs(&self) -> Vec<String> {
        WalkDir::new(self.refs_path())
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(self.path.as_ref()).ok()?;
                Some(relative.to_string_lossy().to_string())
            })
            .collect()
    }

    /// Write a ref file under an exclusive lock, creating parents as needed
    pub fn update_ref_file(&self, relative: &Path, oid: &ObjectId) -> Result<()> {
        let path = self.path.join(relative);
        std::fs::create_dir_all(path.parent().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid ref path {}", path.display()),
            )
        })?)?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut()
            .write_all(format!("{}\n", oid.to_hex()).as_bytes())?;

        Ok(())
    }

    fn read_symref(&self, path: &Path) -> Result<Option<ObjectId>> {
        match SymRefOrOid::read(path)? {
            Some(SymRefOrOid::SymRef(target)) => self.read_symref(&self.path.join(target)),
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            None => Ok(None),
        }
    }

    fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    const OID: &str = "aabbccddeeff00112233445566778899aabbccdd";

    fn refs() -> (TempDir, Refs) {
        let dir = TempDir::new().unwrap();
        let refs = Refs::new(dir.path().to_path_buf().into_boxed_path());
        (dir, refs)
    }

    fn write(dir: &TempDir, relative: &str, content: &str) {
        let path = dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn head_follows_symbolic_ref_to_branch() {
        let (dir, refs) = refs();
        write(&dir, "HEAD", "ref: refs/heads/master\n");
        write(&dir, "refs/heads/master", &format!("{OID}\n"));

        assert_eq!(refs.read_head().unwrap().unwrap().to_hex(), OID);
    }

    #[test]
    fn detached_head_holds_a_direct_id() {
        let (dir, refs) = refs();
        write(&dir, "HEAD", &format!("{OID}\n"));

        assert_eq!(refs.read_head().unwrap().unwrap().to_hex(), OID);
    }

    #[test]
    fn missing_head_resolves_to_none() {
        let (_dir, refs) = refs();
        assert!(refs.read_head().unwrap().is_none());
    }

    #[test]
    fn revparse_passes_full_hex_through() {
        let (_dir, refs) = refs();
        assert_eq!(refs.revparse(OID).unwrap().unwrap().to_hex(), OID);
    }

    #[test]
    fn revparse_tries_heads_then_remotes_then_tags() {
        let (dir, refs) = refs();
        write(&dir, "refs/heads/topic", &format!("{OID}\n"));
        write(
            &dir,
            "refs/remotes/origin/topic",
            "1111111111111111111111111111111111111111\n",
        );
        write(
            &dir,
            "refs/tags/v1",
            "2222222222222222222222222222222222222222\n",
        );

        assert_eq!(refs.revparse("topic").unwrap().unwrap().to_hex(), OID);
        assert_eq!(
            refs.revparse("origin/topic").unwrap().unwrap().to_hex(),
            "1111111111111111111111111111111111111111"
        );
        assert_eq!(
            refs.revparse("v1").unwrap().unwrap().to_hex(),
            "2222222222222222222222222222222222222222"
        );
        assert!(refs.revparse("no-such-ref").unwrap().is_none());
    }

    #[test]
    fn garbage_ref_content_is_invalid_ref() {
        let (dir, refs) = refs();
        write(&dir, "refs/heads/bad", "this is not an id\n");

        assert!(matches!(
            refs.revparse("bad").unwrap_err(),
            GitError::InvalidRef { .. }
        ));
    }

    #[test]
    fn update_ref_file_writes_hex_and_newline() {
        let (dir, refs) = refs();
        let oid = ObjectId::try_parse(OID).unwrap();
        refs.update_ref_file(Path::new("refs/heads/new"), &oid).unwrap();

        let content = std::fs::read_to_string(dir.path().join("refs/heads/new")).unwrap();
        assert_eq!(content, format!("{OID}\n"));
        assert_eq!(refs.revparse("new").unwrap().unwrap(), oid);
    }

    #[test]
    fn list_refs_enumerates_the_hierarchy() {
        let (dir, refs) = refs();
        write(&dir, "refs/heads/master", &format!("{OID}\n"));
        write(&dir, "refs/tags/v1", &format!("{OID}\n"));

        let mut listed = refs.list_refs();
        listed.sort();
        assert_eq!(listed, vec!["refs/heads/master", "refs/tags/v1"]);
    }
}
