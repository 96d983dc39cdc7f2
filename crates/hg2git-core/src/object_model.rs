//! The object model: blobs addressed by content hash, carried as leaves of
//! the [`crate::pathtree::Entry`] tree that represents a branch's working
//! state.
//!
//! A [`FileEntry`] bundles everything needed to stage a file without
//! re-reading its content: the git blob OID (once known), the raw file
//! properties (executable / symlink), git-attributes overrides, and a
//! cached `content_hash` used for cheap equality during tree comparison.

use std::collections::BTreeMap;

use hg2git_git::{EntryMode, GitOid};

/// File-level properties that affect the tree entry mode but not the blob
/// content itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FileProps {
    /// Executable bit.
    pub executable: bool,
    /// Symlink rather than regular file.
    pub symlink: bool,
}

impl FileProps {
    /// Map to the corresponding git tree entry mode.
    #[must_use]
    pub const fn entry_mode(self) -> EntryMode {
        if self.symlink {
            EntryMode::Link
        } else if self.executable {
            EntryMode::BlobExecutable
        } else {
            EntryMode::Blob
        }
    }
}

/// A single file as tracked in a branch's working tree.
///
/// `content_hash` combines the raw data hash, `props`, and `git_attributes`
/// (spec: `H(data_sha1 || sorted(attributes) || props)`), so a mode-only
/// change (`chmod +x`) or an attribute-only change (a new gitattributes
/// override applied by [`crate::config::BranchMap::gitattributes`]) is
/// detected as a modification even when the raw data and git blob OID are
/// unchanged.
///
/// There is no `make_unshared` method here unlike the upstream Python
/// object model: an owned `FileEntry` is already exclusive once it's been
/// cloned out of a [`crate::pathtree::Entry::Leaf`], so mutating a field and
/// writing it back via `Entry::set` *is* the copy-on-write — the tree
/// structure (not the leaf) is what's shared, via `Rc`.
#[derive(Clone, Debug)]
pub struct FileEntry {
    /// Blob OID in the object store, once the content has been hashed in.
    /// `None` for entries staged from raw bytes not yet written (the
    /// projector always resolves this before it reaches the commit builder).
    pub oid: Option<GitOid>,
    /// SHA-1 of the raw file content, independent of the git blob hash
    /// (mercurial revlogs key file content by SHA-1; kept here so the
    /// projector can detect unchanged content without re-hashing).
    pub data_sha1: [u8; 20],
    /// Executable / symlink bits.
    pub props: FileProps,
    /// Per-path gitattributes overrides applied by branch config, e.g.
    /// `text=auto` or `eol=lf`. Sorted by key when hashed so insertion order
    /// never affects `content_hash`.
    pub git_attributes: BTreeMap<String, String>,
    /// Cached combined hash over `data_sha1`, `git_attributes`, and `props`.
    /// Recomputed whenever any of those three change.
    content_hash: blake3::Hash,
}

impl FileEntry {
    /// Construct a new entry from its content hash and properties, with no
    /// gitattributes overrides.
    #[must_use]
    pub fn new(data_sha1: [u8; 20], props: FileProps) -> Self {
        Self::with_attributes(data_sha1, props, BTreeMap::new())
    }

    /// Construct a new entry with explicit gitattributes overrides.
    #[must_use]
    pub fn with_attributes(
        data_sha1: [u8; 20],
        props: FileProps,
        git_attributes: BTreeMap<String, String>,
    ) -> Self {
        let content_hash = combined_hash(&data_sha1, &git_attributes, props);
        Self {
            oid: None,
            data_sha1,
            props,
            git_attributes,
            content_hash,
        }
    }

    /// Attach the resolved git blob OID.
    #[must_use]
    pub fn with_oid(mut self, oid: GitOid) -> Self {
        self.oid = Some(oid);
        self
    }

    /// Apply (or overwrite) a single gitattributes key, recomputing
    /// `content_hash`. A no-op if the key already has this exact value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if self.git_attributes.get(&key) == Some(&value) {
            return;
        }
        self.git_attributes.insert(key, value);
        self.content_hash = combined_hash(&self.data_sha1, &self.git_attributes, self.props);
    }

    /// The cached combined content hash (data + attributes + props).
    #[must_use]
    pub const fn content_hash(&self) -> blake3::Hash {
        self.content_hash
    }
}

fn combined_hash(
    data_sha1: &[u8; 20],
    git_attributes: &BTreeMap<String, String>,
    props: FileProps,
) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data_sha1);
    for (key, value) in git_attributes {
        hasher.update(key.as_bytes());
        hasher.update(b"\0");
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(&[u8::from(props.executable), u8::from(props.symlink)]);
    hasher.finalize()
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

impl Eq for FileEntry {}

/// Hash raw file content (SHA-1), used to populate [`FileEntry::data_sha1`].
#[must_use]
pub fn hash_content(data: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_props_entry_mode() {
        assert_eq!(FileProps::default().entry_mode(), EntryMode::Blob);
        assert_eq!(
            FileProps {
                executable: true,
                symlink: false
            }
            .entry_mode(),
            EntryMode::BlobExecutable
        );
        assert_eq!(
            FileProps {
                executable: false,
                symlink: true
            }
            .entry_mode(),
            EntryMode::Link
        );
    }

    #[test]
    fn file_entry_equality_ignores_oid() {
        let hash = hash_content(b"data");
        let a = FileEntry::new(hash, FileProps::default());
        let b = FileEntry::new(hash, FileProps::default()).with_oid(GitOid::ZERO);
        assert_eq!(a, b);
    }

    #[test]
    fn file_entry_inequality_on_props() {
        let hash = hash_content(b"data");
        let a = FileEntry::new(hash, FileProps::default());
        let b = FileEntry::new(
            hash,
            FileProps {
                executable: true,
                symlink: false,
            },
        );
        assert_ne!(a, b);
    }

    #[test]
    fn hash_content_is_stable() {
        assert_eq!(hash_content(b"abc"), hash_content(b"abc"));
        assert_ne!(hash_content(b"abc"), hash_content(b"abd"));
    }

    #[test]
    fn set_attribute_changes_content_hash() {
        let hash = hash_content(b"data");
        let mut a = FileEntry::new(hash, FileProps::default());
        let before = a.content_hash();
        a.set_attribute("text", "auto");
        assert_ne!(before, a.content_hash());
    }

    #[test]
    fn set_attribute_is_noop_for_same_value() {
        let hash = hash_content(b"data");
        let mut a = FileEntry::new(hash, FileProps::default());
        a.set_attribute("text", "auto");
        let after_first = a.content_hash();
        a.set_attribute("text", "auto");
        assert_eq!(after_first, a.content_hash());
    }

    #[test]
    fn attribute_order_does_not_affect_hash() {
        let hash = hash_content(b"data");
        let mut a = FileEntry::new(hash, FileProps::default());
        a.set_attribute("text", "auto");
        a.set_attribute("eol", "lf");
        let mut b = FileEntry::new(hash, FileProps::default());
        b.set_attribute("eol", "lf");
        b.set_attribute("text", "auto");
        assert_eq!(a, b);
    }
}
