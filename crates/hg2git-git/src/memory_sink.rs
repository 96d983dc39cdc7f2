//! An in-memory [`GitSink`] test double.
//!
//! Used by this crate's own unit tests and by `hg2git-core`'s scenario tests,
//! so conversion logic can be exercised without touching a real object
//! database.

use std::collections::BTreeMap;

use sha1::{Digest, Sha1};

use crate::error::GitError;
use crate::sink::GitSink;
use crate::types::{
    EntryMode, GitOid, IndexUpdate, QueuedRefUpdate, RefName, Signature, TagProps, TreeEntry,
};

#[derive(Clone, Debug)]
enum Object {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit {
        tree: GitOid,
        parents: Vec<GitOid>,
        author: Signature,
        committer: Signature,
        message: String,
    },
    Tag {
        target: GitOid,
        props: TagProps,
    },
}

/// A [`GitSink`] backed by in-memory maps instead of an on-disk object store.
///
/// OIDs are content hashes of a simple canonical encoding — not
/// bit-for-bit identical to real git object hashes, but stable and
/// collision-free for the same logical content, which is all tests need.
#[derive(Default)]
pub struct MemorySink {
    objects: BTreeMap<GitOid, Object>,
    refs: BTreeMap<RefName, GitOid>,
    queued: Vec<QueuedRefUpdate>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read back a blob's content, for test assertions.
    #[must_use]
    pub fn blob(&self, oid: GitOid) -> Option<&[u8]> {
        match self.objects.get(&oid) {
            Some(Object::Blob(data)) => Some(data.as_slice()),
            _ => None,
        }
    }

    /// Read back a tree's entries, for test assertions.
    #[must_use]
    pub fn tree(&self, oid: GitOid) -> Option<&[TreeEntry]> {
        match self.objects.get(&oid) {
            Some(Object::Tree(entries)) => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// Read back a commit's parents and message, for test assertions.
    #[must_use]
    pub fn commit_message(&self, oid: GitOid) -> Option<&str> {
        match self.objects.get(&oid) {
            Some(Object::Commit { message, .. }) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Read back a commit's parent list, for test assertions.
    #[must_use]
    pub fn commit_parents(&self, oid: GitOid) -> Option<&[GitOid]> {
        match self.objects.get(&oid) {
            Some(Object::Commit { parents, .. }) => Some(parents.as_slice()),
            _ => None,
        }
    }

    /// Read back a commit's tree, for test assertions.
    #[must_use]
    pub fn commit_tree_oid(&self, oid: GitOid) -> Option<GitOid> {
        match self.objects.get(&oid) {
            Some(Object::Commit { tree, .. }) => Some(*tree),
            _ => None,
        }
    }

    fn content_hash(kind: &str, bytes: &[u8]) -> GitOid {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b"\0");
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest);
        GitOid::from_bytes(out)
    }

    fn resolve_tree(&self, oid: Option<GitOid>) -> Vec<TreeEntry> {
        match oid {
            None => Vec::new(),
            Some(oid) => self.tree(oid).map(<[TreeEntry]>::to_vec).unwrap_or_default(),
        }
    }
}

impl GitSink for MemorySink {
    fn hash_object(&mut self, data: &[u8]) -> Result<GitOid, GitError> {
        let oid = Self::content_hash("blob", data);
        self.objects.insert(oid, Object::Blob(data.to_vec()));
        Ok(oid)
    }

    fn update_index(
        &mut self,
        base: Option<GitOid>,
        updates: &[IndexUpdate],
    ) -> Result<GitOid, GitError> {
        let mut entries: BTreeMap<String, TreeEntry> = self
            .resolve_tree(base)
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();

        for update in updates {
            match update {
                IndexUpdate::Upsert { path, mode, oid } => {
                    entries.insert(
                        path.clone(),
                        TreeEntry {
                            name: path.clone(),
                            mode: *mode,
                            oid: *oid,
                        },
                    );
                }
                IndexUpdate::Remove { path } => {
                    entries.remove(path);
                }
            }
        }

        let entries: Vec<TreeEntry> = entries.into_values().collect();
        self.write_tree(&entries)
    }

    fn write_tree(&mut self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let encoded: String = sorted
            .iter()
            .map(|e| format!("{:o} {} {}\n", e.mode.octal(), e.oid, e.name))
            .collect();
        let oid = Self::content_hash("tree", encoded.as_bytes());
        self.objects.insert(oid, Object::Tree(sorted));
        Ok(oid)
    }

    fn commit_tree(
        &mut self,
        tree: GitOid,
        parents: &[GitOid],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<GitOid, GitError> {
        let encoded = format!(
            "tree {tree}\nparents {:?}\nauthor {} <{}> {}\ncommitter {} <{}> {}\n\n{message}",
            parents, author.name, author.email, author.date, committer.name, committer.email, committer.date
        );
        let oid = Self::content_hash("commit", encoded.as_bytes());
        self.objects.insert(
            oid,
            Object::Commit {
                tree,
                parents: parents.to_vec(),
                author: author.clone(),
                committer: committer.clone(),
                message: message.to_owned(),
            },
        );
        Ok(oid)
    }

    fn queue_update_ref(&mut self, update: QueuedRefUpdate) {
        self.queued.push(update);
    }

    fn commit_refs_update(&mut self) -> Result<(), GitError> {
        for update in self.queued.drain(..) {
            self.refs.insert(update.name, update.new_oid);
        }
        Ok(())
    }

    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        if let Some(queued) = self.queued.iter().rev().find(|u| &u.name == name) {
            return Ok(Some(queued.new_oid));
        }
        Ok(self.refs.get(name).copied())
    }

    fn tag(&mut self, name: &str, target: GitOid, props: &TagProps) -> Result<(), GitError> {
        let full_name = if name.starts_with("refs/") {
            name.to_owned()
        } else {
            format!("refs/tags/{name}")
        };
        let ref_name = RefName::new(full_name.clone()).map_err(|e| GitError::InvalidRepository {
            path: full_name,
            reason: e.to_string(),
        })?;

        let target_oid = if props.message.is_empty() {
            target
        } else {
            let encoded = format!("tag {target} {}", props.message.join("\n\n"));
            let oid = Self::content_hash("tag", encoded.as_bytes());
            self.objects.insert(
                oid,
                Object::Tag {
                    target,
                    props: props.clone(),
                },
            );
            oid
        };

        self.queue_update_ref(QueuedRefUpdate {
            name: ref_name,
            new_oid: target_oid,
        });
        Ok(())
    }

    fn make_env(&self, author: &Signature, committer: &Signature) -> Vec<(String, String)> {
        vec![
            ("GIT_AUTHOR_NAME".to_owned(), author.name.clone()),
            ("GIT_AUTHOR_EMAIL".to_owned(), author.email.clone()),
            ("GIT_AUTHOR_DATE".to_owned(), author.date.clone()),
            ("GIT_COMMITTER_NAME".to_owned(), committer.name.clone()),
            ("GIT_COMMITTER_EMAIL".to_owned(), committer.email.clone()),
            ("GIT_COMMITTER_DATE".to_owned(), committer.date.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str) -> Signature {
        Signature {
            name: name.to_owned(),
            email: format!("{name}@example.com"),
            date: "1000000000 +0000".to_owned(),
        }
    }

    #[test]
    fn hash_object_is_deterministic() {
        let mut sink = MemorySink::new();
        let a = sink.hash_object(b"hello").unwrap();
        let b = sink.hash_object(b"hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn update_index_upserts_and_removes() {
        let mut sink = MemorySink::new();
        let blob = sink.hash_object(b"content").unwrap();
        let tree1 = sink
            .update_index(
                None,
                &[IndexUpdate::Upsert {
                    path: "a.txt".to_owned(),
                    mode: EntryMode::Blob,
                    oid: blob,
                }],
            )
            .unwrap();
        assert_eq!(sink.tree(tree1).unwrap().len(), 1);

        let tree2 = sink
            .update_index(
                Some(tree1),
                &[IndexUpdate::Remove {
                    path: "a.txt".to_owned(),
                }],
            )
            .unwrap();
        assert!(sink.tree(tree2).unwrap().is_empty());
    }

    #[test]
    fn commit_refs_update_is_batched() {
        let mut sink = MemorySink::new();
        let tree = sink.write_tree(&[]).unwrap();
        let commit = sink
            .commit_tree(tree, &[], &sig("a"), &sig("a"), "msg")
            .unwrap();
        let name = RefName::new("refs/heads/main").unwrap();

        sink.queue_update_ref(QueuedRefUpdate {
            name: name.clone(),
            new_oid: commit,
        });
        assert_eq!(sink.read_ref(&name).unwrap(), Some(commit));

        sink.commit_refs_update().unwrap();
        assert_eq!(sink.read_ref(&name).unwrap(), Some(commit));
    }
}
