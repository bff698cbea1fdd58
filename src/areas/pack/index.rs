//! Pack index parsing
//!
//! A pack index maps each object id contained in its paired pack file to the
//! byte offset of that object's record. Both on-disk versions are read:
//!
//! - **v2**: `\xff t O c` magic, version, 256-entry fan-out, sorted sha
//!   table, CRC table, 31-bit offset table with an escape bit into a 64-bit
//!   large-offset table, then pack and index checksums.
//! - **v1** (legacy): 256-entry fan-out followed by `(offset, sha)` records.
//!
//! The fan-out table counts objects whose first id byte is `<= i`, which
//! narrows lookups to one first-byte bucket before binary search.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{GitError, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;
use std::path::Path;

const INDEX_V2_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const FAN_OUT_ENTRIES: usize = 256;

#[derive(Debug, Clone)]
pub struct PackIndex {
    fan_out: [u32; FAN_OUT_ENTRIES],
    /// Sorted by raw id bytes; parallel to `offsets`
    ids: Vec<ObjectId>,
    offsets: Vec<u64>,
}

impl PackIndex {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data, path)
    }

    pub fn from_bytes(data: &[u8], path: &Path) -> Result<Self> {
        if data.len() >= 4 && data[0..4] == INDEX_V2_MAGIC {
            Self::parse_v2(&data[4..], path)
        } else {
            Self::parse_v1(data, path)
        }
    }

    fn parse_v2(data: &[u8], path: &Path) -> Result<Self> {
        let mut reader = data;
        let truncated = |what: &str| GitError::corrupt_pack(path, format!("index {what} truncated"));

        let version = reader
            .read_u32::<BigEndian>()
            .map_err(|_| truncated("version"))?;
        if version != 2 {
            return Err(GitError::corrupt_pack(
                path,
                format!("unsupported index version {version}"),
            ));
        }

        let fan_out = Self::read_fan_out(&mut reader, path)?;
        let count = fan_out[FAN_OUT_ENTRIES - 1] as usize;

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(ObjectId::read_raw_from(&mut reader).map_err(|_| truncated("sha table"))?);
        }

        // CRC table is present for pack transfer validation; unused here
        let mut crc_table = vec![0u8; count * 4];
        reader
            .read_exact(&mut crc_table)
            .map_err(|_| truncated("crc table"))?;

        let mut small_offsets = Vec::with_capacity(count);
        for _ in 0..count {
            small_offsets.push(
                reader
                    .read_u32::<BigEndian>()
                    .map_err(|_| truncated("offset table"))?,
            );
        }

        // Offsets with the escape bit set index into the 64-bit table
        let large_count = small_offsets.iter().filter(|&&o| o & 0x8000_0000 != 0).count();
        let mut large_offsets = Vec::with_capacity(large_count);
        for _ in 0..large_count {
            large_offsets.push(
                reader
                    .read_u64::<BigEndian>()
                    .map_err(|_| truncated("large-offset table"))?,
            );
        }

        let mut offsets = Vec::with_capacity(count);
        for &small in &small_offsets {
            if small & 0x8000_0000 != 0 {
                let slot = (small & 0x7fff_ffff) as usize;
                let offset = large_offsets.get(slot).copied().ok_or_else(|| {
                    GitError::corrupt_pack(path, format!("large-offset slot {slot} out of range"))
                })?;
                offsets.push(offset);
            } else {
                offsets.push(u64::from(small));
            }
        }

        Self::finish(fan_out, ids, offsets, path)
    }

    fn parse_v1(data: &[u8], path: &Path) -> Result<Self> {
        let mut reader = data;
        let truncated = |what: &str| GitError::corrupt_pack(path, format!("index {what} truncated"));

        let fan_out = Self::read_fan_out(&mut reader, path)?;
        let count = fan_out[FAN_OUT_ENTRIES - 1] as usize;

        let mut ids = Vec::with_capacity(count);
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = reader
                .read_u32::<BigEndian>()
                .map_err(|_| truncated("entry table"))?;
            let id =
                ObjectId::read_raw_from(&mut reader).map_err(|_| truncated("entry table"))?;
            offsets.push(u64::from(offset));
            ids.push(id);
        }

        Self::finish(fan_out, ids, offsets, path)
    }

    fn read_fan_out(reader: &mut &[u8], path: &Path) -> Result<[u32; FAN_OUT_ENTRIES]> {
        let mut fan_out = [0u32; FAN_OUT_ENTRIES];
        for entry in &mut fan_out {
            *entry = reader
                .read_u32::<BigEndian>()
                .map_err(|_| GitError::corrupt_pack(path, "index fan-out truncated"))?;
        }

        if fan_out.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(GitError::corrupt_pack(path, "index fan-out not monotonic"));
        }

        Ok(fan_out)
    }

    fn finish(
        fan_out: [u32; FAN_OUT_ENTRIES],
        ids: Vec<ObjectId>,
        offsets: Vec<u64>,
        path: &Path,
    ) -> Result<Self> {
        if ids.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(GitError::corrupt_pack(path, "index sha table not sorted"));
        }

        Ok(PackIndex {
            fan_out,
            ids,
            offsets,
        })
    }

    /// Resolve an id to its byte offset in the paired pack file
    pub fn lookup(&self, id: &ObjectId) -> Option<u64> {
        let first_byte = id.as_bytes()[0] as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.fan_out[first_byte - 1] as usize
        };
        let end = self.fan_out[first_byte] as usize;

        let bucket = self.ids.get(start..end)?;
        match bucket.binary_search_by(|probe| probe.as_bytes().cmp(id.as_bytes())) {
            Ok(pos) => self.offsets.get(start + pos).copied(),
            Err(_) => None,
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.lookup(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Contained ids in index (sorted) order
    pub fn object_ids(&self) -> &[ObjectId] {
        &self.ids
    }
}
