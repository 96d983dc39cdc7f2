//! The gix-backed implementation of [`GitSink`].

use std::path::Path;

use crate::error::GitError;
use crate::sink::GitSink;
use crate::types::{
    EntryMode, GitOid, IndexUpdate, QueuedRefUpdate, RefName, Signature, TagProps, TreeEntry,
};

/// A [`GitSink`] implementation backed by
/// [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Construct via [`GixSink::open`] or [`GixSink::init_bare`].
pub struct GixSink {
    repo: gix::Repository,
    queued: Vec<QueuedRefUpdate>,
}

impl GixSink {
    /// Open an existing git repository at or above `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open(path).map_err(|e| GitError::InvalidRepository {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            repo,
            queued: Vec::new(),
        })
    }

    /// Initialize a new bare repository at `path` and open it.
    pub fn init_bare(path: &Path) -> Result<Self, GitError> {
        let repo = gix::init_bare(path).map_err(|e| GitError::InvalidRepository {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            repo,
            queued: Vec::new(),
        })
    }
}

fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

fn from_gix_oid(oid: gix::ObjectId) -> GitOid {
    let bytes: [u8; 20] = oid.as_bytes().try_into().expect("SHA1 is 20 bytes");
    GitOid::from_bytes(bytes)
}

fn to_gix_entry_kind(mode: EntryMode) -> gix::objs::tree::EntryKind {
    match mode {
        EntryMode::Blob => gix::objs::tree::EntryKind::Blob,
        EntryMode::BlobExecutable => gix::objs::tree::EntryKind::BlobExecutable,
        EntryMode::Tree => gix::objs::tree::EntryKind::Tree,
        EntryMode::Link => gix::objs::tree::EntryKind::Link,
    }
}

/// Parse a `Signature`'s date field (`"<unix-seconds> <+HHMM>"`) into a
/// `gix_date::Time`. Falls back to `Time::now_utc()` if malformed — the
/// engine is expected to always provide a well-formed date, so this only
/// guards against a caller bug, not user input.
fn to_gix_time(date: &str) -> gix::date::Time {
    let mut parts = date.split_whitespace();
    let seconds: i64 = parts.and_then(|s| s.parse().ok()).unwrap_or(0);
    let offset: i32 = date
        .split_whitespace()
        .nth(1)
        .and_then(parse_offset)
        .unwrap_or(0);
    gix::date::Time::new(seconds, offset)
}

fn parse_offset(raw: &str) -> Option<i32> {
    let (sign, digits) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => (1, raw),
    };
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

fn to_gix_signature(sig: &Signature) -> gix::actor::Signature {
    gix::actor::Signature {
        name: sig.name.as_str().into(),
        email: sig.email.as_str().into(),
        time: to_gix_time(&sig.date),
    }
}

impl GitSink for GixSink {
    fn hash_object(&mut self, data: &[u8]) -> Result<GitOid, GitError> {
        let id = self
            .repo
            .write_blob(data)
            .map_err(|e| GitError::ObjectStore(format!("failed to write blob: {e}")))?;
        Ok(from_gix_oid(id.detach()))
    }

    fn update_index(
        &mut self,
        base: Option<GitOid>,
        updates: &[IndexUpdate],
    ) -> Result<GitOid, GitError> {
        let base_tree = match base {
            Some(oid) => to_gix_oid(oid),
            None => self
                .repo
                .empty_tree()
                .id()
                .detach(),
        };
        let tree = self
            .repo
            .find_tree(base_tree)
            .map_err(|e| GitError::ObjectStore(format!("base tree {base_tree}: {e}")))?;

        let mut editor = tree
            .edit()
            .map_err(|e| GitError::ObjectStore(format!("failed to create tree editor: {e}")))?;

        for update in updates {
            match update {
                IndexUpdate::Upsert { path, mode, oid } => {
                    editor
                        .upsert(path.as_str(), to_gix_entry_kind(*mode), to_gix_oid(*oid))
                        .map_err(|e| {
                            GitError::ObjectStore(format!("index upsert '{path}': {e}"))
                        })?;
                }
                IndexUpdate::Remove { path } => {
                    editor
                        .remove(path.as_str())
                        .map_err(|e| GitError::ObjectStore(format!("index remove '{path}': {e}")))?;
                }
            }
        }

        let new_id = editor
            .write()
            .map_err(|e| GitError::ObjectStore(format!("failed to write staged tree: {e}")))?;
        Ok(from_gix_oid(new_id.detach()))
    }

    fn write_tree(&mut self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
        let mut gix_entries: Vec<gix::objs::tree::Entry> = entries
            .iter()
            .map(|e| gix::objs::tree::Entry {
                mode: to_gix_entry_kind(e.mode).into(),
                filename: e.name.as_str().into(),
                oid: to_gix_oid(e.oid),
            })
            .collect();
        gix_entries.sort();
        let tree = gix::objs::Tree {
            entries: gix_entries,
        };
        let id = self
            .repo
            .write_object(&tree)
            .map_err(|e| GitError::ObjectStore(format!("failed to write tree: {e}")))?;
        Ok(from_gix_oid(id.detach()))
    }

    fn commit_tree(
        &mut self,
        tree: GitOid,
        parents: &[GitOid],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<GitOid, GitError> {
        let commit = gix::objs::Commit {
            tree: to_gix_oid(tree),
            parents: parents.iter().map(|p| to_gix_oid(*p)).collect(),
            author: to_gix_signature(author),
            committer: to_gix_signature(committer),
            encoding: None,
            message: message.into(),
            extra_headers: Vec::new(),
        };
        let id = self
            .repo
            .write_object(&commit)
            .map_err(|e| GitError::ObjectStore(format!("failed to write commit object: {e}")))?;
        Ok(from_gix_oid(id.detach()))
    }

    fn queue_update_ref(&mut self, update: QueuedRefUpdate) {
        self.queued.push(update);
    }

    fn commit_refs_update(&mut self) -> Result<(), GitError> {
        use gix::refs::transaction::{Change, LogChange, PreviousValue, RefEdit as GixRefEdit};
        use gix::refs::Target;

        let edits: Vec<GixRefEdit> = self
            .queued
            .drain(..)
            .map(|update| GixRefEdit {
                change: Change::Update {
                    log: LogChange {
                        message: "hg2git: convert".into(),
                        ..Default::default()
                    },
                    expected: PreviousValue::Any,
                    new: Target::Object(to_gix_oid(update.new_oid)),
                },
                name: update.name.as_str().try_into().map_err(|e| {
                    GitError::RefUpdate {
                        name: update.name.clone(),
                        reason: format!("{e}"),
                    }
                })?,
                deref: false,
            })
            .collect();

        self.repo
            .edit_references(edits)
            .map_err(|e| GitError::ObjectStore(format!("failed to update refs: {e}")))?;
        Ok(())
    }

    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        match self.repo.try_find_reference(name.as_str()) {
            Ok(Some(mut ref_)) => {
                let id = ref_
                    .peel_to_id_in_place()
                    .map_err(|e| GitError::ObjectStore(format!("peel {name}: {e}")))?;
                Ok(Some(from_gix_oid(id.detach())))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(GitError::ObjectStore(format!("read ref {name}: {e}"))),
        }
    }

    fn tag(&mut self, name: &str, target: GitOid, props: &TagProps) -> Result<(), GitError> {
        let full_name = if name.starts_with("refs/") {
            name.to_owned()
        } else {
            format!("refs/tags/{name}")
        };
        let short_name = full_name.strip_prefix("refs/tags/").unwrap_or(&full_name);
        let ref_name = RefName::new(full_name.clone()).map_err(|e| GitError::InvalidRepository {
            path: full_name,
            reason: e.to_string(),
        })?;

        let target_oid = if props.message.is_empty() {
            target
        } else {
            let tag_obj = gix::objs::Tag {
                target: to_gix_oid(target),
                target_kind: gix::objs::Kind::Commit,
                name: short_name.into(),
                tagger: Some(to_gix_signature(&props.tagger)),
                message: props.message.join("\n\n").into(),
                pgp_signature: None,
            };
            let id = self
                .repo
                .write_object(&tag_obj)
                .map_err(|e| GitError::ObjectStore(format!("failed to write tag object: {e}")))?;
            from_gix_oid(id.detach())
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
