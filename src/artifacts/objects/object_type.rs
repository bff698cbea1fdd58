use crate::errors::{GitError, Result};
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Read a `"<type> <len>\0"` loose-object header, returning the type and
    /// the declared payload length
    pub fn parse_header(data_reader: &mut impl BufRead) -> Result<(ObjectType, usize)> {
        let mut type_bytes = Vec::new();
        data_reader.read_until(b' ', &mut type_bytes)?;
        if type_bytes.pop() != Some(b' ') {
            return Err(GitError::InvalidObjectId(
                "truncated object header".to_string(),
            ));
        }

        let object_type = std::str::from_utf8(&type_bytes)
            .map_err(|_| GitError::InvalidObjectId("non-utf8 object type".to_string()))?;
        let object_type = ObjectType::try_from(object_type)?;

        let mut len_bytes = Vec::new();
        data_reader.read_until(b'\0', &mut len_bytes)?;
        if len_bytes.pop() != Some(b'\0') {
            return Err(GitError::InvalidObjectId(
                "truncated object header".to_string(),
            ));
        }

        let length = std::str::from_utf8(&len_bytes)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| GitError::InvalidObjectId("invalid object length".to_string()))?;

        Ok((object_type, length))
    }

    /// The pack-record type code (commit=1, tree=2, blob=3)
    pub fn pack_code(&self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
        }
    }

    pub fn from_pack_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectType::Commit),
            2 => Some(ObjectType::Tree),
            3 => Some(ObjectType::Blob),
            _ => None,
        }
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = GitError;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            other => Err(GitError::InvalidObjectId(format!(
                "invalid object type {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
