//! The [`GitSink`] trait — the single abstraction boundary between the
//! conversion engine and git.
//!
//! The engine never shells out to `git` and never touches an object database
//! directly; every write crosses this trait. Method groups mirror the
//! external-sink operations named in the spec's external interfaces section:
//!
//! | Group        | Methods                                          |
//! |--------------|---------------------------------------------------|
//! | Blobs        | `hash_object`                                     |
//! | Index/trees  | `update_index`, `write_tree`                      |
//! | Commits      | `commit_tree`                                     |
//! | Refs         | `queue_update_ref`, `commit_refs_update`          |
//! | Tags         | `tag`                                             |
//! | Environment  | `make_env`                                        |
//!
//! Ref updates are deliberately batched: the engine calls `queue_update_ref`
//! once per branch/tag as it finishes committing, and only calls
//! `commit_refs_update` once, at the very end of a run, so a crash midway
//! through a conversion never leaves some refs updated and others stale.

use crate::error::GitError;
use crate::types::{GitOid, IndexUpdate, QueuedRefUpdate, RefName, Signature, TagProps, TreeEntry};

/// The git abstraction used by the conversion engine.
///
/// Implementations may be backed by gix (the production backend, see
/// [`GixSink`](crate::GixSink)) or an in-memory test double (see
/// [`MemorySink`](crate::MemorySink)).
///
/// # Object safety
///
/// This trait is object-safe: no generic methods, no `Self` in return
/// position outside of `Result`. Callers may use `&dyn GitSink` or
/// `Box<dyn GitSink>`.
pub trait GitSink {
    // -----------------------------------------------------------------------
    // Blobs
    // -----------------------------------------------------------------------

    /// Write a blob to the object store and return its OID.
    ///
    /// Replaces: `git hash-object -w --stdin`.
    fn hash_object(&mut self, data: &[u8]) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Index / trees
    // -----------------------------------------------------------------------

    /// Apply a batch of staged changes and return the resulting tree OID.
    ///
    /// `base` is the tree to start from (`None` for an empty tree). Updates
    /// are applied in order; a later update to the same path overrides an
    /// earlier one.
    ///
    /// Replaces: `git update-index --index-info` followed by `git write-tree`.
    fn update_index(
        &mut self,
        base: Option<GitOid>,
        updates: &[IndexUpdate],
    ) -> Result<GitOid, GitError>;

    /// Build a tree object directly from a flat list of entries (one level),
    /// without going through the index.
    ///
    /// Replaces: `git mktree`.
    fn write_tree(&mut self, entries: &[TreeEntry]) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// Create a commit object and return its OID. Does not update any ref —
    /// callers queue a ref update separately via [`queue_update_ref`](Self::queue_update_ref).
    ///
    /// Replaces: `git commit-tree <tree> -p <parent> ... -m <message>`.
    #[allow(clippy::too_many_arguments)]
    fn commit_tree(
        &mut self,
        tree: GitOid,
        parents: &[GitOid],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Refs
    // -----------------------------------------------------------------------

    /// Queue a ref update for the final atomic batch. Does not touch the ref
    /// database until [`commit_refs_update`](Self::commit_refs_update) is
    /// called.
    fn queue_update_ref(&mut self, update: QueuedRefUpdate);

    /// Apply every queued ref update in a single atomic batch, then clear the
    /// queue.
    ///
    /// Replaces: `git update-ref --stdin` with `start`/`prepare`/`commit`.
    fn commit_refs_update(&mut self) -> Result<(), GitError>;

    /// Resolve a ref to its current OID, returning `None` if it does not
    /// exist. Reflects both committed refs and anything already queued.
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Create a tag pointing at `target`.
    ///
    /// `name` may be a bare tag name (`v1.0`) or an already-resolved
    /// `refs/...` path (callers that have gone through
    /// [`crate`]-external ref-mapping pass the latter); a bare name is
    /// placed under `refs/tags/`. If `props.message` is non-empty, writes an
    /// annotated tag object. If empty, creates a lightweight tag (the ref
    /// points directly at `target`).
    ///
    /// Replaces: `git tag -a <name> -m <message> <target>` or
    /// `git tag <name> <target>`.
    fn tag(&mut self, name: &str, target: GitOid, props: &TagProps) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Environment
    // -----------------------------------------------------------------------

    /// Build the process environment variables (`GIT_AUTHOR_*`,
    /// `GIT_COMMITTER_*`) that would reproduce `author`/`committer` identity
    /// for any subprocess the caller shells out to directly (e.g. hooks).
    /// The sink itself does not need these for `commit_tree`, but external
    /// tooling invoked by the orchestrator does.
    fn make_env(&self, author: &Signature, committer: &Signature) -> Vec<(String, String)>;
}
