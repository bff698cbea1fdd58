//! Commit object
//!
//! A commit points at a tree snapshot and at zero or more parent commits
//! (more than one indicates a merge), plus author/committer identities and a
//! free-text message.
//!
//! ## Format
//!
//! Payload bytes are line-oriented `key value` headers up to the first blank
//! line, then the message verbatim. `tree` is required, `parent` repeatable.
//! Header keys this layer does not interpret (e.g. `gpgsig`, `encoding`) are
//! preserved in position, continuation lines included, so any decoded commit
//! re-encodes to the exact bytes it was read from and keeps its hash.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{GitError, Result};
use bytes::Bytes;
use std::io::{BufRead, Write};

/// Author or committer identity with timestamp and UTC offset
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signature {
    name: String,
    email: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl Signature {
    pub fn new(
        name: String,
        email: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        Signature {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }

    /// Canonical header form: `name <email> <unix-seconds> <±HHMM>`
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }
}

impl TryFrom<&str> for Signature {
    type Error = GitError;

    fn try_from(value: &str) -> Result<Self> {
        // Split from the right so names may contain spaces
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(GitError::MalformedCommit(format!(
                "invalid signature {value:?}"
            )));
        }

        let offset = parse_utc_offset(parts[0])?;
        let seconds = parts[1].parse::<i64>().map_err(|_| {
            GitError::MalformedCommit(format!("invalid timestamp in signature {value:?}"))
        })?;
        let name_email = parts[2];

        let email_start = name_email.find('<').ok_or_else(|| {
            GitError::MalformedCommit(format!("signature missing '<' in {value:?}"))
        })?;
        let email_end = name_email.find('>').ok_or_else(|| {
            GitError::MalformedCommit(format!("signature missing '>' in {value:?}"))
        })?;

        let name = name_email[..email_start].trim_end().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let timestamp = chrono::DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| {
                GitError::MalformedCommit(format!("timestamp out of range in {value:?}"))
            })?
            .with_timezone(&offset);

        Ok(Signature {
            name,
            email,
            timestamp,
        })
    }
}

/// Parse a `±HHMM` UTC offset
fn parse_utc_offset(s: &str) -> Result<chrono::FixedOffset> {
    let malformed = || GitError::MalformedCommit(format!("invalid UTC offset {s:?}"));

    let (sign, digits) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(malformed()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| malformed())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| malformed())?;
    chrono::FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(malformed)
}

/// One raw header line of a commit, continuation lines folded into the value
#[derive(Debug, Clone, Eq, PartialEq)]
struct Header {
    key: String,
    value: String,
}

/// A snapshot pointer plus ancestry and metadata
///
/// Decoded commits keep every header in its original position so the
/// serialization is byte-identical to the input; authored commits emit the
/// canonical `tree`, `parent`*, `author`, `committer` order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    headers: Vec<Header>,
    tree_oid: ObjectId,
    parents: Vec<ObjectId>,
    author: Signature,
    committer: Signature,
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Signature,
        committer: Signature,
        message: String,
    ) -> Self {
        let mut headers = vec![Header {
            key: "tree".to_string(),
            value: tree_oid.to_hex(),
        }];
        for parent in &parents {
            headers.push(Header {
                key: "parent".to_string(),
                value: parent.to_hex(),
            });
        }
        headers.push(Header {
            key: "author".to_string(),
            value: author.display(),
        });
        headers.push(Header {
            key: "committer".to_string(),
            value: committer.display(),
        });

        Commit {
            headers,
            tree_oid,
            parents,
            author,
            committer,
            message,
        }
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// The first parent, the primary lineage of a merge
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First line of the message
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    /// The committer date, the timestamp walk filters apply to
    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.committer.timestamp()
    }

    /// Header values this layer does not interpret, in position order
    pub fn extra_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter(|h| !matches!(h.key.as_str(), "tree" | "parent" | "author" | "committer"))
            .map(|h| (h.key.as_str(), h.value.as_str()))
    }
}

impl Packable for Commit {
    fn serialize(&self) -> Result<Bytes> {
        let mut payload = Vec::new();

        for header in &self.headers {
            payload.write_all(header.key.as_bytes())?;
            payload.push(b' ');
            // Continuation lines are re-folded with a leading space
            payload.write_all(header.value.replace('\n', "\n ").as_bytes())?;
            payload.push(b'\n');
        }
        payload.push(b'\n');
        payload.write_all(self.message.as_bytes())?;

        Ok(Bytes::from(payload))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut content = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut content)?;
        let content = String::from_utf8(content)
            .map_err(|_| GitError::MalformedCommit("non-utf8 commit payload".to_string()))?;

        // Headers run until the first blank line; the message is everything
        // after it, kept verbatim (trailing newline included)
        let (header_text, message) = match content.split_once("\n\n") {
            Some((headers, message)) => (headers, message.to_string()),
            None => (content.trim_end_matches('\n'), String::new()),
        };

        let mut headers: Vec<Header> = Vec::new();
        for line in header_text.split('\n') {
            if let Some(continuation) = line.strip_prefix(' ') {
                match headers.last_mut() {
                    Some(last) => {
                        last.value.push('\n');
                        last.value.push_str(continuation);
                    }
                    None => {
                        return Err(GitError::MalformedCommit(
                            "continuation line before any header".to_string(),
                        ));
                    }
                }
                continue;
            }

            let (key, value) = line.split_once(' ').ok_or_else(|| {
                GitError::MalformedCommit(format!("invalid header line {line:?}"))
            })?;
            headers.push(Header {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        let tree_oid = headers
            .iter()
            .find(|h| h.key == "tree")
            .ok_or_else(|| GitError::MalformedCommit("missing tree header".to_string()))
            .and_then(|h| ObjectId::try_parse(&h.value).map_err(|_| {
                GitError::MalformedCommit(format!("invalid tree id {:?}", h.value))
            }))?;

        let mut parents = Vec::new();
        for header in headers.iter().filter(|h| h.key == "parent") {
            parents.push(ObjectId::try_parse(&header.value).map_err(|_| {
                GitError::MalformedCommit(format!("invalid parent id {:?}", header.value))
            })?);
        }

        let author = headers
            .iter()
            .find(|h| h.key == "author")
            .ok_or_else(|| GitError::MalformedCommit("missing author header".to_string()))
            .and_then(|h| Signature::try_from(h.value.as_str()))?;
        let committer = headers
            .iter()
            .find(|h| h.key == "committer")
            .ok_or_else(|| GitError::MalformedCommit("missing committer header".to_string()))
            .and_then(|h| Signature::try_from(h.value.as_str()))?;

        Ok(Commit {
            headers,
            tree_oid,
            parents,
            author,
            committer,
            message,
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}
