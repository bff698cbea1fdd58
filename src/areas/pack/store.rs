//! Pack file reading
//!
//! A pack bundles many objects in one file, some stored whole and some as
//! deltas against another object in the same pack. The paired index resolves
//! an id to a record offset; materializing a record may require walking a
//! delta chain down to a non-delta base and applying each instruction stream
//! on the way back out.
//!
//! Packs are produced externally and only read here. File handles live for
//! the store's lifetime and are released on `close` or drop.

use crate::areas::pack::delta;
use crate::areas::pack::index::PackIndex;
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{GitError, Result};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const PACK_MAGIC: &[u8; 4] = b"PACK";

/// Longest possible record prelude: size varint (10) plus a 20-byte delta
/// base id
const MAX_RECORD_HEADER: usize = 32;

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

pub struct PackStore {
    pack_path: PathBuf,
    index: PackIndex,
    /// `None` once closed; interior mutability keeps reads `&self` for the
    /// single-threaded store (the database is not `Sync`)
    pack: RefCell<Option<File>>,
}

impl PackStore {
    /// Open a `.pack` file and its sibling `.idx`
    pub fn open(pack_path: &Path) -> Result<Self> {
        let index = PackIndex::open(&pack_path.with_extension("idx"))?;

        let mut file = File::open(pack_path)?;
        let mut header = [0u8; 12];
        file.read_exact(&mut header)
            .map_err(|_| GitError::corrupt_pack(pack_path, "pack header truncated"))?;

        if &header[0..4] != PACK_MAGIC {
            return Err(GitError::corrupt_pack(pack_path, "bad pack magic"));
        }
        let version = BigEndian::read_u32(&header[4..8]);
        if version != 2 && version != 3 {
            return Err(GitError::corrupt_pack(
                pack_path,
                format!("unsupported pack version {version}"),
            ));
        }

        let record_count = BigEndian::read_u32(&header[8..12]);
        tracing::debug!(
            pack = %pack_path.display(),
            records = record_count,
            indexed = index.len(),
            "opened pack"
        );

        Ok(PackStore {
            pack_path: pack_path.to_path_buf(),
            index,
            pack: RefCell::new(Some(file)),
        })
    }

    pub fn name(&self) -> &Path {
        &self.pack_path
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Look up and materialize an object by id, verifying that the
    /// reconstructed content re-hashes to the id that located it
    pub fn read_object(&self, id: &ObjectId) -> Result<Option<RawObject>> {
        let offset = match self.index.lookup(id) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let raw = self.read_at(offset)?;
        let actual = raw.object_id();
        if actual != *id {
            return Err(GitError::corrupt_object(
                id,
                format!("pack record at offset {offset} re-hashes to {actual}"),
            ));
        }

        Ok(Some(raw))
    }

    /// Materialize the record at a byte offset, resolving delta chains
    ///
    /// The chain walk is iterative and guarded against base cycles: a record
    /// revisited while resolving is `CorruptPack`.
    pub fn read_at(&self, offset: u64) -> Result<RawObject> {
        let mut visited: HashSet<u64> = HashSet::new();
        // Delta streams collected target-first while walking to the base
        let mut chain: Vec<Vec<u8>> = Vec::new();
        let mut cursor = offset;

        let (kind, base) = loop {
            if !visited.insert(cursor) {
                return Err(GitError::corrupt_pack(
                    &self.pack_path,
                    format!("delta-base cycle through offset {cursor}"),
                ));
            }

            let record = self.parse_record(cursor)?;
            match record {
                Record::Direct { kind, size, data_at } => {
                    break (kind, self.inflate(data_at, size)?);
                }
                Record::Delta { base_offset, size, data_at } => {
                    chain.push(self.inflate(data_at, size)?);
                    cursor = base_offset;
                }
            }
        };

        let mut content = base;
        for stream in chain.iter().rev() {
            content = delta::apply_delta(&content, stream)
                .map_err(|reason| GitError::corrupt_pack(&self.pack_path, reason))?;
        }

        Ok(RawObject::new(kind, Bytes::from(content)))
    }

    /// Ids contained in this pack, in index order; finite and restartable
    pub fn each_id(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.index.object_ids().iter().copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Release the pack file handle; subsequent reads fail
    pub fn close(&self) {
        self.pack.borrow_mut().take();
    }

    fn parse_record(&self, offset: u64) -> Result<Record> {
        let prelude = self.read_prelude(offset)?;

        let (type_code, size, mut consumed) = delta::decode_entry_header(&prelude)
            .map_err(|reason| GitError::corrupt_pack(&self.pack_path, reason))?;

        match type_code {
            OFS_DELTA => {
                let (relative, extra) = delta::decode_base_offset(&prelude[consumed..])
                    .map_err(|reason| GitError::corrupt_pack(&self.pack_path, reason))?;
                consumed += extra;

                let base_offset = offset.checked_sub(relative).filter(|_| relative != 0);
                let base_offset = base_offset.ok_or_else(|| {
                    GitError::corrupt_pack(
                        &self.pack_path,
                        format!("offset-delta at {offset} references before pack start"),
                    )
                })?;

                Ok(Record::Delta {
                    base_offset,
                    size,
                    data_at: offset + consumed as u64,
                })
            }
            REF_DELTA => {
                let mut raw = [0u8; 20];
                raw.copy_from_slice(prelude.get(consumed..consumed + 20).ok_or_else(|| {
                    GitError::corrupt_pack(&self.pack_path, "ref-delta base id truncated")
                })?);
                consumed += 20;
                let base_id = ObjectId::from_raw_bytes(raw);

                // Packs are self-contained here: the base must be indexed
                let base_offset = self.index.lookup(&base_id).ok_or_else(|| {
                    GitError::corrupt_pack(
                        &self.pack_path,
                        format!("ref-delta base {base_id} not present in pack"),
                    )
                })?;

                Ok(Record::Delta {
                    base_offset,
                    size,
                    data_at: offset + consumed as u64,
                })
            }
            code => {
                let kind = ObjectType::from_pack_code(code).ok_or_else(|| {
                    GitError::corrupt_pack(
                        &self.pack_path,
                        format!("unsupported record type {code} at offset {offset}"),
                    )
                })?;

                Ok(Record::Direct {
                    kind,
                    size,
                    data_at: offset + consumed as u64,
                })
            }
        }
    }

    fn read_prelude(&self, offset: u64) -> Result<Vec<u8>> {
        let mut guard = self.pack.borrow_mut();
        let file = guard.as_mut().ok_or_else(|| {
            GitError::corrupt_pack(&self.pack_path, "pack store is closed")
        })?;

        file.seek(SeekFrom::Start(offset))?;
        let mut prelude = vec![0u8; MAX_RECORD_HEADER];
        // Short reads near the trailing checksum are fine; the parsers
        // bounds-check what they consume
        let mut filled = 0;
        while filled < prelude.len() {
            let n = file.read(&mut prelude[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        prelude.truncate(filled);

        if prelude.is_empty() {
            return Err(GitError::corrupt_pack(
                &self.pack_path,
                format!("record offset {offset} beyond pack"),
            ));
        }

        Ok(prelude)
    }

    /// Inflate the zlib stream starting at `data_at`, expecting `size`
    /// decompressed bytes
    fn inflate(&self, data_at: u64, size: u64) -> Result<Vec<u8>> {
        let mut guard = self.pack.borrow_mut();
        let file = guard.as_mut().ok_or_else(|| {
            GitError::corrupt_pack(&self.pack_path, "pack store is closed")
        })?;

        file.seek(SeekFrom::Start(data_at))?;
        let mut decoder = flate2::read::ZlibDecoder::new(&mut *file);
        let mut data = Vec::with_capacity(size as usize);
        decoder.read_to_end(&mut data).map_err(|err| {
            GitError::corrupt_pack(
                &self.pack_path,
                format!("zlib inflate failed at offset {data_at}: {err}"),
            )
        })?;

        if data.len() as u64 != size {
            return Err(GitError::corrupt_pack(
                &self.pack_path,
                format!(
                    "record at offset {data_at} declares {size} bytes but inflated to {}",
                    data.len()
                ),
            ));
        }

        Ok(data)
    }
}

impl std::fmt::Debug for PackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackStore")
            .field("pack_path", &self.pack_path)
            .field("objects", &self.index.len())
            .field("open", &self.pack.borrow().is_some())
            .finish()
    }
}

enum Record {
    Direct {
        kind: ObjectType,
        size: u64,
        data_at: u64,
    },
    Delta {
        base_offset: u64,
        size: u64,
        data_at: u64,
    },
}
