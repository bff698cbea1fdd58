//! Unified object store
//!
//! One lookup/insert surface over the loose backend and zero or more pack
//! stores. Reads consult open packs first, then loose storage; a miss
//! triggers a single re-enumeration of the pack directory before `NotFound`,
//! because an external process may have packed objects since this store
//! opened. That retry-once policy is the only staleness guard: there is no
//! file locking, and one `Database` must not be driven from multiple threads.
//!
//! Writes always land in loose storage; packs are read-only here.

use crate::areas::loose::LooseStorage;
use crate::areas::pack::PackStore;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{ObjectBox, RawObject, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{GitError, Result};
use std::cell::RefCell;
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
    loose: LooseStorage,
    /// Open pack stores; replaced wholesale on refresh
    packs: RefCell<Vec<PackStore>>,
}

impl Database {
    /// `path` is the `objects` directory of the repository
    pub fn new(path: Box<Path>) -> Self {
        let loose = LooseStorage::new(path.clone());
        let database = Database {
            path,
            loose,
            packs: RefCell::new(Vec::new()),
        };
        database.refresh_packs();
        database
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store a payload as a loose object, returning its content address
    pub fn put(&self, content: &[u8], kind: ObjectType) -> Result<ObjectId> {
        self.loose.put(content, kind)
    }

    /// Materialize an object from any backend
    ///
    /// Fails `NotFound` only after the pack-directory rescan; corruption in
    /// a backend that claims the id is surfaced, never reported as absence.
    pub fn get(&self, id: &ObjectId) -> Result<RawObject> {
        if let Some(raw) = self.get_from_packs(id)? {
            return Ok(raw);
        }

        match self.loose.get(id) {
            Ok(raw) => return Ok(raw),
            Err(GitError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        // A pack may have appeared since the store opened; rescan once
        self.refresh_packs();
        if let Some(raw) = self.get_from_packs(id)? {
            return Ok(raw);
        }

        Err(GitError::NotFound(*id))
    }

    pub fn exists(&self, id: &ObjectId) -> bool {
        if self.packs.borrow().iter().any(|pack| pack.contains(id)) {
            return true;
        }
        if self.loose.exists(id) {
            return true;
        }

        self.refresh_packs();
        self.packs.borrow().iter().any(|pack| pack.contains(id))
    }

    /// Decode an object into its typed record
    pub fn parse_object(&self, id: &ObjectId) -> Result<ObjectBox> {
        let raw = self.get(id)?;
        let reader = Cursor::new(raw.content);

        match raw.kind {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(reader)?))),
        }
    }

    pub fn parse_object_as_blob(&self, id: &ObjectId) -> Result<Option<Blob>> {
        match self.parse_object(id)? {
            ObjectBox::Blob(blob) => Ok(Some(*blob)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, id: &ObjectId) -> Result<Option<Tree>> {
        match self.parse_object(id)? {
            ObjectBox::Tree(tree) => Ok(Some(*tree)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, id: &ObjectId) -> Result<Option<Commit>> {
        match self.parse_object(id)? {
            ObjectBox::Commit(commit) => Ok(Some(*commit)),
            _ => Ok(None),
        }
    }

    /// Compare two tree snapshots, either side optional
    pub fn tree_diff(
        &self,
        old_oid: Option<&ObjectId>,
        new_oid: Option<&ObjectId>,
        prefix: &Path,
    ) -> Result<TreeDiff> {
        let mut tree_diff = TreeDiff::new(self);
        tree_diff.compare_oids(old_oid, new_oid, prefix)?;
        Ok(tree_diff)
    }

    fn get_from_packs(&self, id: &ObjectId) -> Result<Option<RawObject>> {
        for pack in self.packs.borrow().iter() {
            if let Some(raw) = pack.read_object(id)? {
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }

    /// Re-enumerate `objects/pack`, closing the handles being replaced
    ///
    /// A pack that fails to open is skipped so the store keeps operating on
    /// the remaining packs.
    fn refresh_packs(&self) {
        let mut packs = self.packs.borrow_mut();
        for pack in packs.iter() {
            pack.close();
        }
        packs.clear();

        let pack_dir = self.pack_dir();
        let entries = match std::fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(_) => return, // no pack directory yet
        };

        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("pack") {
                continue;
            }

            match PackStore::open(&path) {
                Ok(pack) => packs.push(pack),
                Err(err) => {
                    tracing::warn!(pack = %path.display(), error = %err, "skipping unreadable pack");
                }
            }
        }

        tracing::debug!(dir = %pack_dir.display(), packs = packs.len(), "rescanned pack directory");
    }

    fn pack_dir(&self) -> PathBuf {
        self.path.join("pack")
    }
}
