//! Object identifier (SHA-1 hash)
//!
//! Object ids are 20-byte SHA-1 hashes, written as 40 hexadecimal characters
//! in textual form. They are computed over `"<type> <len>\0" + content` and
//! never assigned, so they are the sole key into the store.
//!
//! ## Storage
//!
//! Loose objects live at `objects/<first-2-hex-chars>/<remaining-38-chars>`.

use crate::errors::{GitError, Result};
use std::io;
use std::path::PathBuf;

/// Length of an object id in raw bytes
pub const OBJECT_ID_RAW_LENGTH: usize = 20;

/// Length of an object id in hexadecimal form
pub const OBJECT_ID_HEX_LENGTH: usize = 40;

/// A 20-byte SHA-1 object identifier
///
/// Held in binary form so pack-index lookups compare raw bytes; parsed from
/// and displayed as 40 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_RAW_LENGTH]);

impl ObjectId {
    pub fn from_raw_bytes(bytes: [u8; OBJECT_ID_RAW_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse and validate an object id from its 40-hex textual form
    pub fn try_parse(id: &str) -> Result<Self> {
        if id.len() != OBJECT_ID_HEX_LENGTH {
            return Err(GitError::InvalidObjectId(format!(
                "expected {} hex characters, got {}",
                OBJECT_ID_HEX_LENGTH,
                id.len()
            )));
        }

        let mut raw = [0u8; OBJECT_ID_RAW_LENGTH];
        for (i, byte) in raw.iter_mut().enumerate() {
            let pair = &id[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| GitError::InvalidObjectId(id.to_string()))?;
        }

        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_RAW_LENGTH] {
        &self.0
    }

    /// Write the id in binary form (20 bytes)
    ///
    /// Used when serializing tree payloads.
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    /// Read an id from binary form (20 bytes)
    ///
    /// Used when deserializing tree payloads and pack index tables.
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_RAW_LENGTH];
        reader.read_exact(&mut raw)?;
        Ok(Self(raw))
    }

    /// The 40-hex textual form
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// Convert to the loose-storage path `xx/yyyy...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Abbreviated form (first 7 hex characters)
    pub fn to_short_oid(&self) -> String {
        self.to_hex().split_at(7).0.to_string()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn hex_round_trip(hex in "[0-9a-f]{40}") {
            let oid = ObjectId::try_parse(&hex).unwrap();
            assert_eq!(oid.to_hex(), hex);
        }

        #[test]
        fn rejects_wrong_length(hex in "[0-9a-f]{0,39}") {
            assert!(ObjectId::try_parse(&hex).is_err());
        }

        #[test]
        fn rejects_non_hex(prefix in "[0-9a-f]{39}") {
            let bad = format!("{prefix}g");
            assert!(ObjectId::try_parse(&bad).is_err());
        }
    }

    #[test]
    fn splits_path_after_two_characters() {
        let oid = ObjectId::try_parse("aabbccddeeff00112233445566778899aabbccdd").unwrap();
        assert_eq!(
            oid.to_path(),
            PathBuf::from("aa").join("bbccddeeff00112233445566778899aabbccdd")
        );
    }

    #[test]
    fn short_oid_is_seven_characters() {
        let oid = ObjectId::try_parse("aabbccddeeff00112233445566778899aabbccdd").unwrap();
        assert_eq!(oid.to_short_oid(), "aabbccd");
    }

    #[test]
    fn binary_round_trip() {
        let oid = ObjectId::try_parse("0123456789abcdef0123456789abcdef01234567").unwrap();
        let mut buf = Vec::new();
        oid.write_raw_to(&mut buf).unwrap();
        assert_eq!(buf.len(), OBJECT_ID_RAW_LENGTH);

        let read = ObjectId::read_raw_from(&mut buf.as_slice()).unwrap();
        assert_eq!(read, oid);
    }
}
