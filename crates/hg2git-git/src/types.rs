//! Core types shared between the [`GitSink`](crate::GitSink) trait and its
//! callers.
//!
//! These types intentionally contain no gix types — the backend is an
//! implementation detail hidden behind [`GitSink`](crate::GitSink).

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Stored as raw bytes for cheap comparison, hashing, and `Copy` semantics.
/// Displays as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// The zero OID (`0000...0000`), used as a sentinel for "ref does not
    /// exist" and as the initial (empty) tree parent.
    pub const ZERO: Self = Self([0; 20]);

    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero OID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(OidParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[0] as char),
            })?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[1] as char),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

/// Error from parsing a hex string into a [`GitOid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated git ref name.
///
/// Must start with `refs/` or be one of the well-known bare names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

const BARE_REFS: &[&str] = &["HEAD", "FETCH_HEAD", "MERGE_HEAD", "ORIG_HEAD"];

impl RefName {
    /// Create a new `RefName`, validating that it looks like a git ref.
    ///
    /// # Errors
    /// Returns an error if the name is empty, doesn't start with `refs/`,
    /// and isn't a well-known bare ref.
    pub fn new(name: impl Into<String>) -> Result<Self, RefNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), RefNameError> {
        if name.is_empty() {
            return Err(RefNameError {
                value: name.to_owned(),
                reason: "ref name must not be empty".to_owned(),
            });
        }
        if name.starts_with("refs/") || BARE_REFS.contains(&name) {
            Ok(())
        } else {
            Err(RefNameError {
                value: name.to_owned(),
                reason: "ref name must start with 'refs/' or be a well-known ref".to_owned(),
            })
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefName {
    type Err = RefNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error from validating a [`RefName`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefNameError {
    /// The invalid value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for RefNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ref name {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for RefNameError {}

// ---------------------------------------------------------------------------
// RefEdit
// ---------------------------------------------------------------------------

/// A single ref update, queued for the end-of-run atomic batch.
///
/// Ref updates are never applied one at a time: the core queues them as it
/// commits branches and tags, and the sink only touches the ref database
/// once, in [`GitSink::commit_refs_update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedRefUpdate {
    /// The ref to update.
    pub name: RefName,
    /// The new OID to set the ref to.
    pub new_oid: GitOid,
}

// ---------------------------------------------------------------------------
// Tree types
// ---------------------------------------------------------------------------

/// The file mode of a tree entry (analogous to `git ls-tree`'s mode column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`040000`).
    Tree,
    /// Symbolic link (`120000`).
    Link,
}

impl EntryMode {
    /// The octal mode value, as used by `update-index`/`mktree` plumbing.
    #[must_use]
    pub const fn octal(self) -> u32 {
        match self {
            Self::Blob => 0o100_644,
            Self::BlobExecutable => 0o100_755,
            Self::Tree => 0o40_000,
            Self::Link => 0o120_000,
        }
    }
}

/// A single entry in a git tree object, as submitted to [`GitSink::write_tree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or directory name (just the basename, not a full path).
    pub name: String,
    /// The entry mode.
    pub mode: EntryMode,
    /// The OID of the blob or tree this entry points to.
    pub oid: GitOid,
}

// ---------------------------------------------------------------------------
// Index update types
// ---------------------------------------------------------------------------

/// A single staged change for [`GitSink::update_index`].
///
/// Mirrors the `update-index --index-info` line format:
/// `mode sha1 0\tpath` for an add/change, or the null mode/OID for a delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexUpdate {
    /// Stage a blob at `path` with the given mode and content OID.
    Upsert {
        /// Slash-separated path relative to the tree root.
        path: String,
        /// File mode for the entry.
        mode: EntryMode,
        /// OID of the blob to store at this path.
        oid: GitOid,
    },
    /// Remove the entry at `path`. No-op if it does not exist.
    Remove {
        /// Slash-separated path relative to the tree root.
        path: String,
    },
}

// ---------------------------------------------------------------------------
// Commit identity types
// ---------------------------------------------------------------------------

/// An author or committer identity plus a timestamp, as required by
/// `commit-tree`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Date string, already formatted the way `commit-tree` expects
    /// (`<unix-seconds> <+HHMM>`), or any RFC 2822-ish string the backend
    /// accepts.
    pub date: String,
}

/// Tag metadata for [`GitSink::tag`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagProps {
    /// Annotated tag message paragraphs (joined with blank lines). Empty
    /// means "create a lightweight ref instead".
    pub message: Vec<String>,
    /// Tagger identity, used only when `message` is non-empty.
    pub tagger: Signature,
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- GitOid --

    #[test]
    fn oid_roundtrip_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let oid: GitOid = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
    }

    #[test]
    fn oid_zero() {
        assert!(GitOid::ZERO.is_zero());
        assert_eq!(
            GitOid::ZERO.to_string(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn oid_rejects_short() {
        assert!("abc".parse::<GitOid>().is_err());
    }

    #[test]
    fn oid_rejects_non_hex() {
        let bad = "g".repeat(40);
        assert!(bad.parse::<GitOid>().is_err());
    }

    // -- RefName --

    #[test]
    fn ref_name_accepts_refs_prefix() {
        assert!(RefName::new("refs/heads/default").is_ok());
        assert!(RefName::new("refs/tags/v1").is_ok());
    }

    #[test]
    fn ref_name_accepts_bare_head() {
        assert!(RefName::new("HEAD").is_ok());
    }

    #[test]
    fn ref_name_rejects_unprefixed() {
        assert!(RefName::new("default").is_err());
    }

    #[test]
    fn ref_name_rejects_empty() {
        assert!(RefName::new("").is_err());
    }

    // -- EntryMode --

    #[test]
    fn entry_mode_octal_values() {
        assert_eq!(EntryMode::Blob.octal(), 0o100_644);
        assert_eq!(EntryMode::BlobExecutable.octal(), 0o100_755);
        assert_eq!(EntryMode::Tree.octal(), 0o40_000);
        assert_eq!(EntryMode::Link.octal(), 0o120_000);
    }
}
