//! Branch state: the committed revision chain, the `HEAD`/`stage`
//! sentinels, and ref-name bookkeeping for a single output branch.
//!
//! Revisions are stored in an arena (`Branch::revisions`, append-only) and
//! cross-referenced by `(branch id, local index)` pairs rather than by
//! pointer — this sidesteps reference cycles entirely, since merge parents
//! always point backward in stream order.

use std::collections::BTreeMap;
use std::rc::Rc;

use hg2git_git::GitOid;

use crate::object_model::FileEntry;
use crate::pathtree::Entry;

/// Index of a branch within the orchestrator's branch list.
pub type BranchId = usize;

/// A reference to a specific committed revision of some branch, used for
/// merge-parent links and the merged-revisions table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentRef {
    /// The branch the referenced revision belongs to.
    pub branch: BranchId,
    /// Index into that branch's `revisions` arena.
    pub index: usize,
}

/// Author/date/message triple carried by one input changeset, pending
/// combination into an eventual commit.
#[derive(Clone, Debug, Default)]
pub struct RevisionProps {
    /// Author string as given by the source changeset.
    pub author: String,
    /// Commit/author date as given by the source changeset.
    pub datetime: String,
    /// Raw log message.
    pub message: String,
}

/// One revision of a branch: either the pending `stage`, the current `HEAD`,
/// or a historical entry in `Branch::revisions`.
#[derive(Clone, Debug)]
pub struct BranchRevision {
    /// Source revision number.
    pub rev: u64,
    /// Source revision id.
    pub rev_id: String,
    /// Working tree. `None` only when the branch has been logically
    /// deleted.
    pub tree: Option<Rc<Entry<FileEntry>>>,
    /// Git tree OID of the last commit built from this revision, if any.
    pub committed_tree: Option<GitOid>,
    /// Git commit OID, once built and emitted.
    pub commit: Option<GitOid>,
    /// Merge parents recorded via `BranchParent` nodes, plus the implicit
    /// first parent (the branch's own previous `HEAD`) which callers add
    /// explicitly before building a commit.
    pub parents: Vec<ParentRef>,
    /// Per-branch highest merged revision, shared by reference down the
    /// chain and copied on first local write (copy-on-write).
    pub merged_revisions: Rc<BTreeMap<BranchId, u64>>,
    /// Tag labels attached to this revision.
    pub tags: Vec<String>,
    /// Cherry-pick sources recorded via `CherryPick` nodes, already resolved
    /// to the specific branch revision they name (resolution happens at
    /// node-apply time, in the orchestrator; an unresolvable source is
    /// dropped with a warning there and never reaches this list).
    pub cherry_picks: Vec<ParentRef>,
    /// Author/date/message of every changeset folded into this revision
    /// without yet producing a commit (topmost, i.e. last pushed, wins for
    /// author/date; messages concatenate as paragraphs).
    pub props_list: Vec<RevisionProps>,
    /// Change-Id inherited from a single remaining cherry-pick source (see
    /// [`crate::commit`]'s cherry-pick footer synthesis), or carried over
    /// from a `Change-Id:` trailer already present in the combined message.
    pub change_id: Option<String>,
}

impl BranchRevision {
    /// A fresh, empty revision: no tree content, no parents, inheriting the
    /// given merged-revisions table.
    #[must_use]
    pub fn new(rev: u64, rev_id: impl Into<String>, merged_revisions: Rc<BTreeMap<BranchId, u64>>) -> Self {
        Self {
            rev,
            rev_id: rev_id.into(),
            tree: Some(Rc::new(Entry::empty_dir())),
            committed_tree: None,
            commit: None,
            parents: Vec::new(),
            merged_revisions,
            tags: Vec::new(),
            cherry_picks: Vec::new(),
            props_list: Vec::new(),
            change_id: None,
        }
    }

    /// Record that `branch`'s revision `rev` has now been merged into this
    /// chain, updating the shared table copy-on-write if it actually
    /// advances the recorded value.
    pub fn record_merge(&mut self, branch: BranchId, rev: u64) {
        match self.merged_revisions.get(&branch) {
            Some(&merged) if merged >= rev => return,
            _ => {}
        }
        let mut updated = (*self.merged_revisions).clone();
        updated.insert(branch, rev);
        self.merged_revisions = Rc::new(updated);
    }

    /// True once the branch carrying this revision has been retired.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.tree.is_none()
    }
}

/// A single output branch: its ref names, its committed history, and the
/// stage/HEAD sentinels the orchestrator mutates as it applies nodes.
#[derive(Debug)]
pub struct Branch {
    /// This branch's index in the orchestrator's branch list.
    pub id: BranchId,
    /// Source branch name.
    pub name: String,
    /// Resolved, collision-free output refname (e.g. `refs/heads/main`).
    pub refname: String,
    /// First revision number this branch was created at.
    pub first_revision: u64,
    /// Last committed (or inherited) state.
    pub head: BranchRevision,
    /// Pending revision being assembled.
    pub stage: BranchRevision,
    /// Committed history, in commit order. Index `i` corresponds to the
    /// `i`-th commit this branch produced, independent of `rev` gaps.
    pub revisions: Vec<BranchRevision>,
    /// True once a `BranchDelete` node has retired this branch.
    pub retired: bool,
}

impl Branch {
    /// Create a new branch starting at `rev`/`rev_id` with an empty tree
    /// and no merge history.
    #[must_use]
    pub fn new(id: BranchId, name: String, refname: String, rev: u64, rev_id: String) -> Self {
        let merged = Rc::new(BTreeMap::new());
        let head = BranchRevision::new(rev, rev_id.clone(), merged.clone());
        let stage = BranchRevision::new(rev, rev_id, merged);
        Self {
            id,
            name,
            refname,
            first_revision: rev,
            head,
            stage,
            revisions: Vec::new(),
            retired: false,
        }
    }

    /// Retire this branch: mark it so no further commits are built, and
    /// clear the stage tree per the "deleted" invariant.
    pub fn retire(&mut self) {
        self.retired = true;
        self.stage.tree = None;
    }

    /// Replace `stage` with a fresh revision inheriting `head`'s merged-
    /// revisions table, after a commit cycle completes.
    pub fn reset_stage(&mut self, rev: u64, rev_id: String) {
        self.stage = BranchRevision::new(rev, rev_id, self.head.merged_revisions.clone());
    }

    /// The per-revision ref name for revision `rev` under this branch,
    /// given the already-resolved output refname. Mirrors
    /// [`crate::config::BranchMap::revisions_ref`] for branches whose
    /// config entry provided no explicit template: substitutes a leading
    /// `refs/heads/`/`refs/` prefix for `refs/revisions/`.
    #[must_use]
    pub fn default_revisions_ref(&self, rev: u64) -> String {
        let tail = self
            .refname
            .strip_prefix("refs/heads/")
            .or_else(|| self.refname.strip_prefix("refs/"))
            .unwrap_or(&self.refname);
        format!("refs/revisions/{tail}/r{rev}")
    }
}
