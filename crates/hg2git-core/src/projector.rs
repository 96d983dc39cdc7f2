//! Revision projection: turn one input changeset into an ordered list of
//! [`RevisionNode`]s for the orchestrator to apply.
//!
//! Ordering is significant and fixed: branch topology nodes first, then file
//! deltas, then tag nodes, then an optional cherry-pick node. Callers
//! (the orchestrator/branch layer) assemble the per-kind inputs — this
//! module only encodes the ordering and per-kind policy, independent of how
//! the caller tracked branch liveness or fetched prior tree content.

use std::collections::BTreeMap;

use crate::hgignore::hgignore_to_gitignore;
use crate::object_model::FileProps;
use crate::reader::RevisionNode;

/// One raw file-level change as reported by the reader (single-parent case)
/// or derived from a full-tree comparison (merge case) — the projector
/// doesn't care which.
#[derive(Clone, Debug)]
pub struct RawFileChange {
    /// Slash-separated path.
    pub path: String,
    /// The change itself.
    pub kind: RawChangeKind,
}

/// The two possible shapes of a raw file-level change.
#[derive(Clone, Debug)]
pub enum RawChangeKind {
    /// File created or modified.
    Upsert {
        /// Raw content.
        data: Vec<u8>,
        /// Executable/symlink bits as reported upstream.
        props: FileProps,
    },
    /// File removed.
    Delete,
}

/// Everything the `.hgignore`/`.gitignore` interaction needs beyond the raw
/// change list itself, resolved by the caller from tree state it already
/// holds.
#[derive(Clone, Copy, Debug, Default)]
pub struct HgIgnorePolicy<'a> {
    /// Whether `.hgignore` translation is enabled (`--convert-hgignore`).
    pub enabled: bool,
    /// The sibling `.gitignore`'s content in the *parent* tree, used to
    /// restore it when `.hgignore` is deleted without a matching raw
    /// `.gitignore` delete in this revision.
    pub parent_gitignore: Option<&'a [u8]>,
    /// The sibling `.hgignore`'s content as it stands *after* this
    /// revision's own `.hgignore` changes are applied (so: `None` if this
    /// revision deletes it, the parent's content if untouched, the new
    /// content if this revision changes it). Used to regenerate
    /// `.gitignore` when a revision deletes it directly while `.hgignore`
    /// still exists.
    pub hgignore_content_after_revision: Option<&'a [u8]>,
}

/// Branch-topology inputs for the first node group (step 1 of the
/// projection order).
#[derive(Clone, Debug, Default)]
pub struct BranchContext {
    /// True if this changeset starts a new output branch: its first parent
    /// is on a different branch, or the first parent already has another
    /// child on this branch (a sub-branch split).
    pub branch_is_new: bool,
    /// The branch name to add, when `branch_is_new`.
    pub new_branch_name: Option<String>,
    /// Additional parents' `rev_id`s, beyond the first (merge parents).
    pub extra_parent_rev_ids: Vec<String>,
    /// Branch names that have no remaining children after this changeset
    /// and should be retired.
    pub retiring_branches: Vec<String>,
}

fn sibling_path(path: &str, new_name: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{new_name}"),
        None => new_name.to_owned(),
    }
}

fn is_named(path: &str, name: &str) -> bool {
    path.rsplit('/').next() == Some(name)
}

fn normalize_props(mut props: FileProps) -> FileProps {
    if props.symlink {
        props.executable = false;
    }
    props
}

/// Emit the branch topology nodes: `add`, then `parent` nodes for each
/// additional merge parent, then `delete` nodes for branches retired by
/// this changeset.
#[must_use]
pub fn project_branch_nodes(ctx: &BranchContext) -> Vec<RevisionNode> {
    let mut nodes = Vec::new();
    if ctx.branch_is_new
        && let Some(name) = &ctx.new_branch_name
    {
        nodes.push(RevisionNode::BranchAdd { name: name.clone() });
    }
    for rev_id in &ctx.extra_parent_rev_ids {
        nodes.push(RevisionNode::BranchParent {
            rev_id: rev_id.clone(),
        });
    }
    for name in &ctx.retiring_branches {
        nodes.push(RevisionNode::BranchDelete { name: name.clone() });
    }
    nodes
}

/// Emit file-level nodes, applying the `.hgignore`/`.gitignore`
/// translation policy and the normal-form rule that symlink implies
/// non-executable.
///
/// Dispatch order when both `.hgignore` and `.gitignore` are touched in the
/// same revision: any raw `.gitignore` change is emitted first, then the
/// `.hgignore`-derived change is emitted — so the derived change wins, since
/// the orchestrator applies nodes in emission order.
#[must_use]
pub fn project_file_nodes(
    changes: Vec<RawFileChange>,
    policy: &HgIgnorePolicy<'_>,
) -> Vec<RevisionNode> {
    let mut primary = Vec::new();
    let mut hgignore_change = None;

    for change in changes {
        if policy.enabled && is_named(&change.path, ".hgignore") {
            hgignore_change = Some(change);
        } else {
            primary.push(change);
        }
    }

    let mut nodes: Vec<RevisionNode> = primary
        .into_iter()
        .map(|change| match change.kind {
            RawChangeKind::Upsert { data, props } => RevisionNode::FileChange {
                path: change.path,
                data,
                props: normalize_props(props),
            },
            RawChangeKind::Delete => RevisionNode::FileDelete { path: change.path },
        })
        .collect();

    if policy.enabled {
        for node in &mut nodes {
            if let RevisionNode::FileDelete { path } = node
                && is_named(path, ".gitignore")
                && let Some(content) = policy.hgignore_content_after_revision
            {
                *node = RevisionNode::FileChange {
                    path: path.clone(),
                    data: hgignore_to_gitignore(content),
                    props: FileProps::default(),
                };
            }
        }
    }

    if let Some(change) = hgignore_change {
        let gitignore_path = sibling_path(&change.path, ".gitignore");
        match change.kind {
            RawChangeKind::Upsert { data, .. } => {
                nodes.push(RevisionNode::FileChange {
                    path: gitignore_path,
                    data: hgignore_to_gitignore(&data),
                    props: FileProps::default(),
                });
            }
            RawChangeKind::Delete => {
                if let Some(parent_content) = policy.parent_gitignore {
                    nodes.push(RevisionNode::FileChange {
                        path: gitignore_path,
                        data: parent_content.to_vec(),
                        props: FileProps::default(),
                    });
                }
            }
        }
    }

    nodes
}

/// Emit one tag node per label, in declaration order.
#[must_use]
pub fn project_tag_nodes(tags: &[String]) -> Vec<RevisionNode> {
    tags.iter()
        .map(|name| RevisionNode::Tag { name: name.clone() })
        .collect()
}

/// Emit a cherry-pick node if `extra["source"]` names a source revision.
#[must_use]
pub fn project_cherrypick_node(extra: &BTreeMap<String, String>) -> Option<RevisionNode> {
    extra.get("source").map(|source_rev_id| RevisionNode::CherryPick {
        source_rev_id: source_rev_id.clone(),
    })
}

/// Project a full changeset into its ordered node list: branch topology,
/// file deltas, tags, then an optional cherry-pick node.
#[must_use]
pub fn project_revision(
    branch_ctx: &BranchContext,
    file_changes: Vec<RawFileChange>,
    ignore_policy: &HgIgnorePolicy<'_>,
    tags: &[String],
    extra: &BTreeMap<String, String>,
) -> Vec<RevisionNode> {
    let mut nodes = project_branch_nodes(branch_ctx);
    nodes.extend(project_file_nodes(file_changes, ignore_policy));
    nodes.extend(project_tag_nodes(tags));
    if let Some(node) = project_cherrypick_node(extra) {
        nodes.push(node);
    }
    nodes
}
