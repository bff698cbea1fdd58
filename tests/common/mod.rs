#![allow(dead_code)]

//! Shared fixtures: an on-disk repository builder and a synthetic pack
//! writer, so tests can exercise the store against real file layouts.

use byteorder::{BigEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use rawgit::artifacts::objects::commit::{Commit, Signature};
use rawgit::artifacts::objects::object::{Packable, hash_object};
use rawgit::artifacts::objects::object_type::ObjectType;
use rawgit::artifacts::objects::tree::{REGULAR_FILE_MODE, TREE_MODE, Tree, TreeEntry};
use rawgit::{Database, ObjectId, Repository};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A throwaway repository with a real `.git` layout
pub struct FixtureRepo {
    pub dir: assert_fs::TempDir,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = assert_fs::TempDir::new().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(".git/objects/pack")).expect("git layout");
        std::fs::create_dir_all(dir.path().join(".git/refs/heads")).expect("git layout");
        FixtureRepo { dir }
    }

    pub fn git_dir(&self) -> PathBuf {
        self.dir.path().join(".git")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.git_dir().join("objects")
    }

    pub fn pack_dir(&self) -> PathBuf {
        self.objects_dir().join("pack")
    }

    pub fn repository(&self) -> Repository {
        Repository::open(self.dir.path()).expect("open repository")
    }

    pub fn database(&self) -> Database {
        Database::new(self.objects_dir().into_boxed_path())
    }

    pub fn write_ref(&self, name: &str, oid: &ObjectId) {
        let path = self.git_dir().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("{}\n", oid.to_hex())).unwrap();
    }

    pub fn set_head_to_branch(&self, branch: &str) {
        std::fs::write(
            self.git_dir().join("HEAD"),
            format!("ref: refs/heads/{branch}\n"),
        )
        .unwrap();
    }
}

pub fn store_blob(database: &Database, content: &str) -> ObjectId {
    database
        .put(content.as_bytes(), ObjectType::Blob)
        .expect("store blob")
}

/// Store a flat tree of regular files
pub fn store_tree(database: &Database, files: &[(&str, &str)]) -> ObjectId {
    let entries = files
        .iter()
        .map(|(name, content)| {
            let blob = store_blob(database, content);
            TreeEntry::new(REGULAR_FILE_MODE.to_string(), name.to_string(), blob)
        })
        .collect();
    store_tree_entries(database, entries)
}

pub fn store_tree_entries(database: &Database, entries: Vec<TreeEntry>) -> ObjectId {
    let payload = Tree::from_entries(entries).serialize().expect("serialize tree");
    database.put(&payload, ObjectType::Tree).expect("store tree")
}

pub fn subtree_entry(name: &str, oid: ObjectId) -> TreeEntry {
    TreeEntry::new(TREE_MODE.to_string(), name.to_string(), oid)
}

pub fn timestamp(hour: u32) -> chrono::DateTime<chrono::FixedOffset> {
    use chrono::TimeZone;
    chrono::FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 15, hour, 0, 0)
        .unwrap()
}

pub fn store_commit(
    database: &Database,
    tree: ObjectId,
    parents: Vec<ObjectId>,
    message: &str,
    hour: u32,
) -> ObjectId {
    let who = Signature::new(
        "A U Thor".to_string(),
        "author@example.com".to_string(),
        timestamp(hour),
    );
    let commit = Commit::new(parents, tree, who.clone(), who, format!("{message}\n"));
    let payload = commit.serialize().expect("serialize commit");
    database.put(&payload, ObjectType::Commit).expect("store commit")
}

// ---------------------------------------------------------------------------
// Synthetic pack writer

enum PackEntry {
    Full {
        kind: ObjectType,
        content: Vec<u8>,
    },
    OfsDelta {
        base: usize,
        kind: ObjectType,
        content: Vec<u8>,
        delta: Vec<u8>,
    },
    RefDelta {
        base: usize,
        kind: ObjectType,
        content: Vec<u8>,
        delta: Vec<u8>,
    },
}

/// Builds a `.pack`/`.idx` pair from explicit records, deltas included
pub struct PackBuilder {
    entries: Vec<PackEntry>,
}

impl PackBuilder {
    pub fn new() -> Self {
        PackBuilder {
            entries: Vec::new(),
        }
    }

    /// Add a whole (non-delta) object; returns its record position
    pub fn add_object(&mut self, kind: ObjectType, content: &[u8]) -> usize {
        self.entries.push(PackEntry::Full {
            kind,
            content: content.to_vec(),
        });
        self.entries.len() - 1
    }

    /// Add an offset-delta record reconstructing `content` from the record at
    /// position `base`
    pub fn add_ofs_delta(&mut self, base: usize, kind: ObjectType, content: &[u8]) -> usize {
        let delta = delta_against(self.content_of(base), content);
        self.entries.push(PackEntry::OfsDelta {
            base,
            kind,
            content: content.to_vec(),
            delta,
        });
        self.entries.len() - 1
    }

    /// Add a ref-delta record whose base is named by id
    pub fn add_ref_delta(&mut self, base: usize, kind: ObjectType, content: &[u8]) -> usize {
        let delta = delta_against(self.content_of(base), content);
        self.entries.push(PackEntry::RefDelta {
            base,
            kind,
            content: content.to_vec(),
            delta,
        });
        self.entries.len() - 1
    }

    pub fn object_id(&self, position: usize) -> ObjectId {
        let (kind, content) = self.record(position);
        hash_object(kind, content)
    }

    /// Write `<name>.pack` and a v2 `<name>.idx` into `pack_dir`
    pub fn write(&self, pack_dir: &Path, name: &str) -> Vec<ObjectId> {
        self.write_with_index(pack_dir, name, encode_index_v2)
    }

    /// Same pack, legacy v1 index
    pub fn write_v1_index(&self, pack_dir: &Path, name: &str) -> Vec<ObjectId> {
        self.write_with_index(pack_dir, name, encode_index_v1)
    }

    fn write_with_index(
        &self,
        pack_dir: &Path,
        name: &str,
        encode_index: fn(&[(ObjectId, u64)]) -> Vec<u8>,
    ) -> Vec<ObjectId> {
        let (pack, offsets) = self.encode_pack();

        let entries: Vec<(ObjectId, u64)> = offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| (self.object_id(i), offset))
            .collect();

        std::fs::write(pack_dir.join(format!("{name}.pack")), pack).expect("write pack");
        std::fs::write(pack_dir.join(format!("{name}.idx")), encode_index(&entries))
            .expect("write index");

        entries.into_iter().map(|(id, _)| id).collect()
    }

    fn encode_pack(&self) -> (Vec<u8>, Vec<u64>) {
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.write_u32::<BigEndian>(2).unwrap();
        pack.write_u32::<BigEndian>(self.entries.len() as u32)
            .unwrap();

        let mut offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let offset = pack.len() as u64;
            offsets.push(offset);

            match entry {
                PackEntry::Full { kind, content } => {
                    pack.extend(encode_record_header(
                        kind.pack_code(),
                        content.len() as u64,
                    ));
                    pack.extend(compress(content));
                }
                PackEntry::OfsDelta { base, delta, .. } => {
                    pack.extend(encode_record_header(6, delta.len() as u64));
                    pack.extend(encode_base_offset(offset - offsets[*base]));
                    pack.extend(compress(delta));
                }
                PackEntry::RefDelta { base, delta, .. } => {
                    pack.extend(encode_record_header(7, delta.len() as u64));
                    pack.extend_from_slice(self.object_id(*base).as_bytes());
                    pack.extend(compress(delta));
                }
            }
        }

        // Trailing pack checksum; readers locate records through the index
        pack.extend_from_slice(&[0u8; 20]);
        (pack, offsets)
    }

    fn record(&self, position: usize) -> (ObjectType, &[u8]) {
        match &self.entries[position] {
            PackEntry::Full { kind, content }
            | PackEntry::OfsDelta { kind, content, .. }
            | PackEntry::RefDelta { kind, content, .. } => (*kind, content),
        }
    }

    fn content_of(&self, position: usize) -> &[u8] {
        self.record(position).1
    }
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Pack record header: type code in bits 4-6 of the first byte, size in the
/// low nibble then 7-bit continuation groups
pub fn encode_record_header(type_code: u8, mut size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = ((type_code & 0x07) << 4) | (size & 0x0f) as u8;
    size >>= 4;
    while size > 0 {
        out.push(byte | 0x80);
        byte = (size & 0x7f) as u8;
        size >>= 7;
    }
    out.push(byte);
    out
}

/// Negative-offset varint of offset-delta records: big-endian 7-bit groups
/// with an extra +1 per continuation byte
pub fn encode_base_offset(mut value: u64) -> Vec<u8> {
    let mut out = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        value -= 1;
        out.insert(0, 0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    out
}

pub fn encode_size_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

/// A delta stream rebuilding `target`: copy the shared prefix of `base`,
/// insert the rest literally
pub fn delta_against(base: &[u8], target: &[u8]) -> Vec<u8> {
    let shared = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut delta = Vec::new();
    delta.extend(encode_size_varint(base.len() as u64));
    delta.extend(encode_size_varint(target.len() as u64));

    if shared > 0 {
        // Copy opcode, offset 0, explicit size bytes (bits 4-5)
        delta.push(0x80 | 0x10 | 0x20);
        delta.push((shared & 0xff) as u8);
        delta.push(((shared >> 8) & 0xff) as u8);
    }
    for chunk in target[shared..].chunks(127) {
        delta.push(chunk.len() as u8);
        delta.extend_from_slice(chunk);
    }

    delta
}

pub fn encode_index_v2(entries: &[(ObjectId, u64)]) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut data = Vec::new();
    data.extend_from_slice(&[0xff, b't', b'O', b'c']);
    data.write_u32::<BigEndian>(2).unwrap();

    for count in fan_out(&sorted) {
        data.write_u32::<BigEndian>(count).unwrap();
    }
    for (id, _) in &sorted {
        data.extend_from_slice(id.as_bytes());
    }
    for _ in &sorted {
        data.write_u32::<BigEndian>(0).unwrap(); // crc, unchecked by readers
    }

    let mut large = Vec::new();
    for (_, offset) in &sorted {
        if *offset > 0x7fff_ffff {
            data.write_u32::<BigEndian>(0x8000_0000 | large.len() as u32)
                .unwrap();
            large.push(*offset);
        } else {
            data.write_u32::<BigEndian>(*offset as u32).unwrap();
        }
    }
    for offset in large {
        data.write_u64::<BigEndian>(offset).unwrap();
    }

    data.extend_from_slice(&[0u8; 40]);
    data
}

pub fn encode_index_v1(entries: &[(ObjectId, u64)]) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut data = Vec::new();
    for count in fan_out(&sorted) {
        data.write_u32::<BigEndian>(count).unwrap();
    }
    for (id, offset) in &sorted {
        data.write_u32::<BigEndian>(*offset as u32).unwrap();
        data.extend_from_slice(id.as_bytes());
    }
    data.extend_from_slice(&[0u8; 40]);
    data
}

fn fan_out(sorted: &[(ObjectId, u64)]) -> [u32; 256] {
    let mut fan_out = [0u32; 256];
    for (id, _) in sorted {
        for slot in (id.as_bytes()[0] as usize)..256 {
            fan_out[slot] += 1;
        }
    }
    fan_out
}
