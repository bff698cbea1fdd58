//! Loose object storage
//!
//! One zlib-compressed object per file, stored under a path derived from its
//! content hash: the first two hex characters as a directory, the remaining
//! 38 as the file name. The compressed bytes are `"<type> <len>\0<content>"`;
//! the id is computed over the uncompressed form, so it is independent of
//! compression parameters.

use crate::artifacts::objects::object::{RawObject, hash_object};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{GitError, Result};
use bytes::Bytes;
use fake::rand;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LooseStorage {
    path: Box<Path>,
}

impl LooseStorage {
    /// `path` is the `objects` directory of the repository
    pub fn new(path: Box<Path>) -> Self {
        LooseStorage { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store a payload, returning its content address
    ///
    /// Idempotent: putting identical bytes twice yields the same id and
    /// leaves the existing file untouched.
    pub fn put(&self, content: &[u8], kind: ObjectType) -> Result<ObjectId> {
        let oid = hash_object(kind, content);
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            let mut raw = format!("{} {}\0", kind.as_str(), content.len()).into_bytes();
            raw.extend_from_slice(content);

            std::fs::create_dir_all(object_path.parent().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid object path {}", object_path.display()),
                )
            })?)?;

            self.write_object(&object_path, &raw)?;
        }

        Ok(oid)
    }

    /// Materialize the object stored under `id`
    ///
    /// The recovered bytes are self-verified: a declared-length mismatch or a
    /// payload that does not re-hash to `id` is `CorruptObject`, never an
    /// empty result.
    pub fn get(&self, id: &ObjectId) -> Result<RawObject> {
        let object_path = self.path.join(id.to_path());

        let compressed = match std::fs::read(&object_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(GitError::NotFound(*id));
            }
            Err(err) => return Err(err.into()),
        };

        let raw = Self::decompress(&compressed)
            .map_err(|err| GitError::corrupt_object(id, format!("zlib inflate failed: {err}")))?;

        let mut reader = Cursor::new(raw);
        let (kind, declared_len) = ObjectType::parse_header(&mut reader)
            .map_err(|_| GitError::corrupt_object(id, "malformed object header"))?;

        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        if content.len() != declared_len {
            return Err(GitError::corrupt_object(
                id,
                format!(
                    "declared length {declared_len} but payload is {} bytes",
                    content.len()
                ),
            ));
        }

        let actual = hash_object(kind, &content);
        if actual != *id {
            return Err(GitError::corrupt_object(
                id,
                format!("content re-hashes to {actual}"),
            ));
        }

        Ok(RawObject::new(kind, Bytes::from(content)))
    }

    pub fn exists(&self, id: &ObjectId) -> bool {
        self.path.join(id.to_path()).exists()
    }

    fn write_object(&self, object_path: &Path, raw: &[u8]) -> Result<()> {
        let object_dir = object_path.parent().expect("object path has a parent");
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let compressed = Self::compress(raw)?;

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_object_path)?;
        file.write_all(&compressed)?;
        drop(file);

        // rename the temp file to the object file to make the write atomic
        std::fs::rename(&temp_object_path, object_path)?;

        Ok(())
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }

    fn generate_temp_name() -> PathBuf {
        PathBuf::from(format!("tmp-obj-{}", rand::random::<u32>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    fn storage() -> (TempDir, LooseStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LooseStorage::new(dir.path().join("objects").into_boxed_path());
        (dir, storage)
    }

    #[test]
    fn put_then_get_round_trips_every_type() {
        let (_dir, storage) = storage();

        for kind in [ObjectType::Blob, ObjectType::Tree, ObjectType::Commit] {
            let content = format!("payload for {kind}");
            let oid = storage.put(content.as_bytes(), kind).unwrap();

            let raw = storage.get(&oid).unwrap();
            assert_eq!(raw.kind, kind);
            assert_eq!(&raw.content[..], content.as_bytes());
        }
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, storage) = storage();

        let first = storage.put(b"same bytes", ObjectType::Blob).unwrap();
        let second = storage.put(b"same bytes", ObjectType::Blob).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn id_depends_on_type_as_well_as_content() {
        let (_dir, storage) = storage();

        let blob = storage.put(b"same bytes", ObjectType::Blob).unwrap();
        let tree = storage.put(b"same bytes", ObjectType::Tree).unwrap();
        assert_ne!(blob, tree);
    }

    #[test]
    fn missing_object_is_not_found_never_corrupt() {
        let (_dir, storage) = storage();
        let absent = ObjectId::try_parse("00112233445566778899aabbccddeeff00112233").unwrap();

        assert!(!storage.exists(&absent));
        assert!(matches!(
            storage.get(&absent).unwrap_err(),
            GitError::NotFound(_)
        ));
    }

    #[test]
    fn tampered_content_is_reported_corrupt() {
        let (_dir, storage) = storage();
        let oid = storage.put(b"original", ObjectType::Blob).unwrap();

        // Overwrite with validly-compressed bytes that hash differently
        let object_path = storage.objects_path().join(oid.to_path());
        let forged = LooseStorage::compress(b"blob 6\0forged").unwrap();
        std::fs::write(&object_path, forged).unwrap();

        assert!(matches!(
            storage.get(&oid).unwrap_err(),
            GitError::CorruptObject { .. }
        ));
    }

    #[test]
    fn length_mismatch_is_reported_corrupt() {
        let (_dir, storage) = storage();
        let oid = storage.put(b"original", ObjectType::Blob).unwrap();

        let object_path = storage.objects_path().join(oid.to_path());
        let forged = LooseStorage::compress(b"blob 99\0original").unwrap();
        std::fs::write(&object_path, forged).unwrap();

        assert!(matches!(
            storage.get(&oid).unwrap_err(),
            GitError::CorruptObject { .. }
        ));
    }

    #[test]
    fn known_hash_matches_external_tooling() {
        // `echo -n 'hello world' | git hash-object --stdin`
        let (_dir, storage) = storage();
        let oid = storage.put(b"hello world", ObjectType::Blob).unwrap();
        assert_eq!(oid.to_hex(), "95d09f2b10159347eece71399a7e2e907ea3df4f");
    }
}
