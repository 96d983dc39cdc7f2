//! The changeset reader contract.
//!
//! The core never talks to Mercurial directly — a concrete reader
//! implementation (outside this crate's scope) streams [`InputRevision`]
//! records in parent-before-child order. This module only defines the data
//! those records carry and the trait the orchestrator pulls them through.

use std::collections::BTreeMap;

use crate::object_model::FileProps;

/// A single input changeset, as produced by an external reader.
///
/// Invariants (owned by the reader, relied on by the projector): parents
/// precede children in stream order; `rev_id` is unique; `branch_name` is
/// non-empty.
#[derive(Clone, Debug)]
pub struct InputRevision {
    /// Monotonic sequence number assigned by the reader.
    pub rev: u64,
    /// Stable content-addressed identifier from the source VCS.
    pub rev_id: String,
    /// Author string, as written in the source history (e.g.
    /// `"Jane Doe <jane@example.com>"`).
    pub author: String,
    /// Raw commit message, not yet split into paragraphs.
    pub log: String,
    /// Commit timestamp as `"<unix-seconds> <+HHMM>"`.
    pub datetime: String,
    /// Source branch name this changeset belongs to.
    pub branch_name: String,
    /// Parent revision ids, in discovery order. Empty for a root revision.
    pub parents: Vec<String>,
    /// Child revision ids known at the time this revision was read.
    pub children: Vec<String>,
    /// Free-form extra metadata (e.g. `source` for cherry-pick provenance).
    pub extra: BTreeMap<String, String>,
    /// The revision-nodes already derived for this changeset, in emission
    /// order. Populated by [`crate::projector::project_revision`]; readers
    /// populate only the fields above and pass an empty vec here.
    pub nodes: Vec<RevisionNode>,
}

/// A single file-level or branch-level event emitted by the projector.
#[derive(Clone, Debug, PartialEq)]
pub enum RevisionNode {
    /// A file was added or changed (same node kind — the diff direction is
    /// implied by whether the path previously existed).
    FileChange {
        /// Slash-separated path.
        path: String,
        /// Raw file content.
        data: Vec<u8>,
        /// Executable / symlink bits.
        props: FileProps,
    },
    /// A file was removed.
    FileDelete {
        /// Slash-separated path.
        path: String,
    },
    /// The head branch begins here (first changeset on a branch, or a
    /// sub-branch split).
    BranchAdd {
        /// Output branch name (post branch-map resolution happens later, in
        /// the orchestrator).
        name: String,
    },
    /// An additional merge parent, identified by its source-VCS revision id.
    BranchParent {
        /// The parent's `rev_id`.
        rev_id: String,
    },
    /// The named branch has no further children reachable from here and is
    /// retired.
    BranchDelete {
        /// Output branch name.
        name: String,
    },
    /// A tag label attached to this changeset.
    Tag {
        /// Tag name.
        name: String,
    },
    /// This changeset is a cherry-pick of another revision.
    CherryPick {
        /// The source revision's `rev_id`.
        source_rev_id: String,
    },
}

/// The contract an external Mercurial-history reader must satisfy.
///
/// Implementations live outside this crate: this trait exists purely so
/// the projector and orchestrator can be written and tested against it
/// without depending on a concrete VCS library.
pub trait ChangesetReader {
    /// The error type surfaced on history read failure.
    type Error: std::error::Error + 'static;

    /// Stream revisions, parents before children. The reader is expected to
    /// drop its internal reference to a revision's full tree once the core
    /// has consumed it, to bound memory on large histories.
    fn next_revision(&mut self) -> Result<Option<InputRevision>, Self::Error>;
}
