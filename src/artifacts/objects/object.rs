use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::BufRead;
use std::path::PathBuf;

/// An undecoded object as produced by the stores: its type plus the raw
/// payload bytes, without the `"<type> <len>\0"` header. Immutable once
/// created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectType,
    pub content: Bytes,
}

impl RawObject {
    pub fn new(kind: ObjectType, content: Bytes) -> Self {
        RawObject { kind, content }
    }

    /// The id this object hashes to: `SHA1("<type> <len>\0" + content)`
    pub fn object_id(&self) -> ObjectId {
        hash_object(self.kind, &self.content)
    }
}

/// Compute the content address of an object payload
pub fn hash_object(kind: ObjectType, content: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind.as_str(), content.len()).as_bytes());
    hasher.update(content);
    ObjectId::from_raw_bytes(hasher.finalize().into())
}

pub trait Packable {
    /// Serialize to canonical payload bytes (header excluded; the store owns
    /// the header)
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    /// Deserialize from payload bytes, the header having already been
    /// consumed
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        Ok(hash_object(self.object_type(), &content))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    pub fn kind(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
        }
    }
}
