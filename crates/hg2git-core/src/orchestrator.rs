//! The project tree: owns every output branch, the all-refs collision
//! registry, and drives the per-revision node-apply + commit pass.
//!
//! This is the one stateful piece of the engine — everything downstream
//! ([`crate::commit`], [`crate::pathtree`], [`crate::object_model`]) is
//! either pure or only mutates through the handle it's given. The
//! orchestrator never talks to a VCS directly: it consumes
//! [`InputRevision`]s whose `nodes` are already projected (by
//! [`crate::projector::project_revision`], run by the concrete reader
//! adapter before a revision reaches here).

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use hg2git_git::{GitError, GitSink, RefName, Signature};

use crate::branch::{Branch, BranchId, ParentRef, RevisionProps};
use crate::commit::{self, CommitError, CommitOptions, ParentInfo, ResolvedCherryPick};
use crate::config::{self, ProjectMapping};
use crate::object_model::{hash_content, FileEntry};
use crate::pathtree::Entry;
use crate::progress::{ProgressSink, ProgressStats};
use crate::reader::{ChangesetReader, InputRevision, RevisionNode};

/// Errors from applying a revision's nodes or assembling its commit.
#[derive(Debug)]
pub enum HistoryError {
    /// A `BranchParent`/`CherryPick` node named a `rev_id` this orchestrator
    /// has never seen (parents must precede children in stream order).
    UnresolvedParent { rev_id: String, branch: String },
    /// A `BranchDelete` node named a branch that isn't the current
    /// changeset's own branch.
    InconsistentBranchDelete { branch: String },
    /// The commit builder failed.
    Commit(CommitError),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedParent { rev_id, branch } => {
                write!(f, "revision {rev_id} referenced by branch {branch} was never seen")
            }
            Self::InconsistentBranchDelete { branch } => {
                write!(f, "branch delete for {branch} does not match the current branch")
            }
            Self::Commit(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<CommitError> for HistoryError {
    fn from(e: CommitError) -> Self {
        Self::Commit(e)
    }
}

impl From<GitError> for HistoryError {
    fn from(e: GitError) -> Self {
        Self::Commit(CommitError::Sink(e))
    }
}

/// Run a branch's configured message-edit rules over `text` in declaration
/// order, stopping early once an `is_final` rule matches.
fn apply_edit_rules(rules: &[config::EditRule], text: &str, rev: u64) -> String {
    let mut current = text.to_owned();
    for rule in rules {
        let (edited, matched) = rule.apply(&current, rev);
        current = edited;
        if matched && rule.is_final {
            break;
        }
    }
    current
}

/// Parse a single gitattributes directive (e.g. `text=auto`, `-text`,
/// `text`) into a `(key, value)` pair for [`FileEntry::set_attribute`].
fn parse_attribute_directive(directive: &str) -> (String, String) {
    if let Some(key) = directive.strip_prefix('-') {
        (key.to_owned(), "false".to_owned())
    } else if let Some((key, value)) = directive.split_once('=') {
        (key.to_owned(), value.to_owned())
    } else {
        (directive.to_owned(), "true".to_owned())
    }
}

/// The branch list, ref-collision registry, and per-revision driving logic.
pub struct Orchestrator<'a, S: GitSink> {
    config: &'a ProjectMapping,
    sink: &'a mut S,
    options: CommitOptions,
    branches: Vec<Branch>,
    current_branch: Option<BranchId>,
    rev_id_index: BTreeMap<String, ParentRef>,
    all_refs: Entry<String>,
    progress: Option<&'a mut dyn ProgressSink>,
    stats: ProgressStats,
}

impl<'a, S: GitSink> Orchestrator<'a, S> {
    /// Create a fresh orchestrator over an empty branch list.
    #[must_use]
    pub fn new(config: &'a ProjectMapping, sink: &'a mut S, options: CommitOptions) -> Self {
        Self {
            config,
            sink,
            options,
            branches: Vec::new(),
            current_branch: None,
            rev_id_index: BTreeMap::new(),
            all_refs: Entry::empty_dir(),
            progress: None,
            stats: ProgressStats::default(),
        }
    }

    /// Report progress through `sink` after every applied revision.
    #[must_use]
    pub fn with_progress(mut self, sink: &'a mut dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Run the whole conversion: pull every revision from `reader` in order,
    /// apply it, then finalize branch refs.
    ///
    /// # Errors
    /// Propagates the reader's own error type (wrapped), or a
    /// [`HistoryError`] from node application or commit assembly.
    pub fn run<R: ChangesetReader>(&mut self, reader: &mut R) -> Result<(), RunError<R::Error>> {
        while let Some(revision) = reader.next_revision().map_err(RunError::Reader)? {
            self.apply_revision(revision)?;
        }
        self.finalize()?;
        Ok(())
    }

    /// Apply one already-projected revision: resolve its branch, replay its
    /// nodes, then build (or elide) its commit.
    ///
    /// # Errors
    /// See [`HistoryError`].
    pub fn apply_revision(&mut self, revision: InputRevision) -> Result<(), HistoryError> {
        self.current_branch = self.resolve_current_branch(&revision)?;

        for node in &revision.nodes {
            self.apply_node(&revision, node)?;
        }

        let branch_id = self
            .current_branch
            .expect("a root revision's nodes must include a BranchAdd before any other node");
        let committed_before = self.branches[branch_id].head.commit;
        self.commit_branch(branch_id, &revision)?;

        self.stats.revisions_processed += 1;
        if self.branches[branch_id].head.commit != committed_before {
            self.stats.commits_made += 1;
        }
        if let Some(sink) = self.progress.as_deref_mut() {
            sink.on_progress(self.stats);
        }
        Ok(())
    }

    /// Resolve the branch a revision belongs to from its first parent.
    /// `None` for a root revision (no parents): the branch is established
    /// later, by a `BranchAdd` node, when [`Self::apply_node`] runs.
    fn resolve_current_branch(&mut self, rev: &InputRevision) -> Result<Option<BranchId>, HistoryError> {
        match rev.parents.first() {
            Some(first_parent) => {
                let parent_ref = *self.rev_id_index.get(first_parent).ok_or_else(|| HistoryError::UnresolvedParent {
                    rev_id: first_parent.clone(),
                    branch: rev.branch_name.clone(),
                })?;
                Ok(Some(parent_ref.branch))
            }
            None => Ok(None),
        }
    }

    /// Create a new output branch for source name `name`, optionally
    /// inheriting `starting_tree` (a sub-branch split continuing from the
    /// branch currently active).
    fn create_branch(&mut self, name: &str, rev: u64, rev_id: String, starting_tree: Option<Rc<Entry<FileEntry>>>) -> BranchId {
        let id = self.branches.len();
        let map = self.config.map_branch(name);
        let resolved_refname = map.map_or_else(String::new, |m| m.refname_template.replace("{name}", name));
        let blocked = map.is_none_or(config::BranchMap::is_blocked);

        let mut branch = Branch::new(id, name.to_owned(), resolved_refname, rev, rev_id);
        if let Some(tree) = starting_tree {
            branch.stage.tree = Some(tree);
        }
        if blocked {
            branch.retire();
        }
        self.branches.push(branch);
        id
    }

    fn apply_node(&mut self, rev: &InputRevision, node: &RevisionNode) -> Result<(), HistoryError> {
        match node {
            RevisionNode::FileChange { path, data, props } => self.apply_file_change(path, data, *props)?,
            RevisionNode::FileDelete { path } => self.apply_file_delete(path),
            RevisionNode::BranchAdd { name } => self.apply_branch_add(name, rev),
            RevisionNode::BranchParent { rev_id } => self.apply_branch_parent(rev_id)?,
            RevisionNode::BranchDelete { name } => self.apply_branch_delete(name)?,
            RevisionNode::Tag { name } => self.apply_tag(name),
            RevisionNode::CherryPick { source_rev_id } => self.apply_cherry_pick(source_rev_id),
        }
        Ok(())
    }

    fn apply_branch_add(&mut self, name: &str, rev: &InputRevision) {
        let starting_tree = self.current_branch.and_then(|id| self.branches[id].stage.tree.clone());
        let new_id = self.create_branch(name, rev.rev, rev.rev_id.clone(), starting_tree);
        self.current_branch = Some(new_id);
    }

    fn apply_file_change(&mut self, path: &str, data: &[u8], props: crate::object_model::FileProps) -> Result<(), HistoryError> {
        let branch_id = self.current_branch.expect("current branch resolved before node application");
        if self.branches[branch_id].retired {
            return Ok(());
        }

        let data_sha1 = hash_content(data);
        let mut entry = FileEntry::new(data_sha1, props);
        if let Some(map) = self.config.map_branch(&self.branches[branch_id].name) {
            for (glob, directive) in &map.gitattributes {
                if config::glob_match(glob, path) {
                    let (key, value) = parse_attribute_directive(directive);
                    entry.set_attribute(key, value);
                }
            }
        }
        let oid = self.sink.hash_object(data)?;
        entry = entry.with_oid(oid);

        let branch = &mut self.branches[branch_id];
        let tree = branch.stage.tree.get_or_insert_with(|| Rc::new(Entry::empty_dir()));
        *tree = Rc::new(tree.set(path, entry));
        Ok(())
    }

    fn apply_file_delete(&mut self, path: &str) {
        let branch_id = self.current_branch.expect("current branch resolved before node application");
        let branch = &mut self.branches[branch_id];
        if branch.retired {
            return;
        }
        if let Some(tree) = &branch.stage.tree {
            branch.stage.tree = Some(Rc::new(tree.delete(path)));
        }
    }

    fn apply_branch_parent(&mut self, rev_id: &str) -> Result<(), HistoryError> {
        let branch_id = self.current_branch.expect("current branch resolved before node application");
        if self.branches[branch_id].retired {
            return Ok(());
        }
        let parent_ref = *self.rev_id_index.get(rev_id).ok_or_else(|| HistoryError::UnresolvedParent {
            rev_id: rev_id.to_owned(),
            branch: self.branches[branch_id].name.clone(),
        })?;
        self.branches[branch_id].stage.parents.push(parent_ref);

        let source_rev = self.branches[parent_ref.branch].revisions[parent_ref.index].clone();
        self.branches[branch_id].stage.record_merge(parent_ref.branch, source_rev.rev);
        for (b, r) in source_rev.merged_revisions.iter() {
            self.branches[branch_id].stage.record_merge(*b, *r);
        }
        Ok(())
    }

    fn apply_branch_delete(&mut self, name: &str) -> Result<(), HistoryError> {
        let branch_id = self.current_branch.expect("current branch resolved before node application");
        if self.branches[branch_id].name == name {
            if !self.branches[branch_id].retired {
                self.branches[branch_id].retire();
            }
            Ok(())
        } else {
            Err(HistoryError::InconsistentBranchDelete { branch: name.to_owned() })
        }
    }

    fn apply_tag(&mut self, name: &str) {
        let branch_id = self.current_branch.expect("current branch resolved before node application");
        if self.branches[branch_id].retired {
            return;
        }
        match self.config.map_tag(name) {
            Some(Some(_target)) => self.branches[branch_id].stage.tags.push(name.to_owned()),
            Some(None) => tracing::warn!(tag = name, "tag explicitly unmapped; dropping"),
            None => tracing::warn!(tag = name, "no tag mapping rule matched; dropping"),
        }
    }

    fn apply_cherry_pick(&mut self, source_rev_id: &str) {
        let branch_id = self.current_branch.expect("current branch resolved before node application");
        if self.branches[branch_id].retired {
            return;
        }
        match self.rev_id_index.get(source_rev_id) {
            Some(&parent_ref) => self.branches[branch_id].stage.cherry_picks.push(parent_ref),
            None => tracing::warn!(source = source_rev_id, "cherry-pick source not found; dropping"),
        }
    }

    fn commit_branch(&mut self, branch_id: BranchId, rev: &InputRevision) -> Result<(), HistoryError> {
        self.branches[branch_id].stage.rev = rev.rev;
        self.branches[branch_id].stage.rev_id = rev.rev_id.clone();

        let edited_message = self
            .config
            .map_branch(&self.branches[branch_id].name)
            .map_or_else(|| rev.log.clone(), |m| apply_edit_rules(&m.edit_rules, &rev.log, rev.rev));

        self.branches[branch_id].stage.props_list.insert(
            0,
            RevisionProps {
                author: rev.author.clone(),
                datetime: rev.datetime.clone(),
                message: edited_message,
            },
        );

        let retired = self.branches[branch_id].retired;
        let head = self.branches[branch_id].head.clone();

        let mut parents = Vec::new();
        if head.commit.is_some() {
            parents.push(ParentInfo {
                source: ParentRef {
                    branch: branch_id,
                    index: self.branches[branch_id].revisions.len().saturating_sub(1),
                },
                commit: head.commit,
                committed_tree: head.committed_tree,
                tree: head.tree.clone(),
            });
        }
        let extra_parents = self.branches[branch_id].stage.parents.clone();
        for p in &extra_parents {
            let source = &self.branches[p.branch].revisions[p.index];
            parents.push(ParentInfo {
                source: *p,
                commit: source.commit,
                committed_tree: source.committed_tree,
                tree: source.tree.clone(),
            });
        }

        let cherry_refs = self.branches[branch_id].stage.cherry_picks.clone();
        let mut resolved = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for cp in &cherry_refs {
            let effective_index = commit::walk_back_empty_revs(&self.branches[cp.branch], cp.index);
            let source = self.branches[cp.branch].revisions[effective_index].clone();
            if commit::is_merged_from(&head, cp.branch, source.rev) {
                continue;
            }
            let Some(commit_oid) = source.commit else { continue };
            if !seen.insert(commit_oid) {
                continue;
            }
            resolved.push(ResolvedCherryPick {
                short_ref: commit::short_ref(&self.branches[cp.branch].refname, &self.branches[cp.branch].name),
                commit: source.commit,
                rev: source.rev,
                change_id: source.change_id.clone(),
            });
        }

        let refname = self.branches[branch_id].refname.clone();
        let branch_name = self.branches[branch_id].name.clone();
        let gitattributes = self.config.map_branch(&branch_name).map(|m| m.gitattributes.clone()).unwrap_or_default();
        let stage = self.branches[branch_id].stage.clone();

        let outcome = if retired {
            commit::BuiltRevision {
                committed: false,
                committed_tree: head.committed_tree,
                commit: head.commit,
            }
        } else {
            commit::build_commit(self.sink, &gitattributes, &refname, &branch_name, &stage, &head, &parents, resolved, self.options)?
        };

        let mut new_rev = stage;
        new_rev.commit = outcome.commit;
        new_rev.committed_tree = outcome.committed_tree;
        if let Some(first) = parents.first() {
            if let Some(source) = self.branches[first.source.branch].revisions.get(first.source.index) {
                let table = source.merged_revisions.clone();
                for (b, r) in table.iter() {
                    new_rev.record_merge(*b, *r);
                }
            }
        }

        if !retired {
            for tag_name in new_rev.tags.clone() {
                let target_template = match self.config.map_tag(&tag_name) {
                    Some(Some(t)) => t.to_owned(),
                    _ => continue,
                };
                let Ok(tag_refname) = RefName::new(target_template.replace("{name}", &tag_name)) else {
                    continue;
                };
                let Some(commit_oid) = new_rev.commit.or(head.commit) else {
                    continue;
                };
                let (name, email) = commit::parse_name_email(&rev.author);
                let tagger = Signature {
                    name,
                    email,
                    date: rev.datetime.clone(),
                };
                commit::build_tag(self.sink, &tag_refname, commit_oid, &[], tagger)?;
            }
        }

        self.branches[branch_id].revisions.push(new_rev.clone());
        self.branches[branch_id].head = new_rev;
        self.branches[branch_id].reset_stage(rev.rev, rev.rev_id.clone());

        let idx = self.branches[branch_id].revisions.len() - 1;
        self.rev_id_index.insert(rev.rev_id.clone(), ParentRef { branch: branch_id, index: idx });
        Ok(())
    }

    /// Probe `refname`, `refname___1`, … `refname___99` against the all-refs
    /// collision tree. Returns `None` if every candidate's full path already
    /// exists, or if the chosen candidate's interior path is blocked by a
    /// non-directory entry (unresolvable; caller should warn and drop).
    fn make_unique_refname(&mut self, refname: &str, owner: &str) -> Option<String> {
        if refname.is_empty() {
            return None;
        }
        for i in 0..100u32 {
            let candidate = if i == 0 { refname.to_owned() } else { format!("{refname}___{i}") };
            if self.all_refs.get_leaf(&candidate).is_some() {
                continue;
            }
            if ancestor_is_leaf(&self.all_refs, &candidate) {
                tracing::warn!(refname = candidate, "ref path conflicts with an existing non-directory entry");
                return None;
            }
            self.all_refs = self.all_refs.set(&candidate, owner.to_owned());
            return Some(candidate);
        }
        tracing::warn!(refname, "could not find a non-conflicting name after 99 attempts");
        None
    }

    /// Write every live branch's output ref, resolving name collisions, then
    /// flush the queued ref updates in one atomic batch.
    ///
    /// # Errors
    /// Propagates the sink's `commit_refs_update` failure.
    pub fn finalize(&mut self) -> Result<(), HistoryError> {
        let live: Vec<BranchId> = (0..self.branches.len())
            .filter(|&id| !self.branches[id].retired && self.branches[id].head.commit.is_some())
            .collect();

        for branch_id in live {
            let candidate = self.branches[branch_id].refname.clone();
            if candidate.is_empty() {
                continue;
            }
            let owner = format!("{}#{}", self.branches[branch_id].name, branch_id);
            let Some(resolved) = self.make_unique_refname(&candidate, &owner) else {
                continue;
            };
            let Ok(refname) = RefName::new(resolved) else { continue };
            let commit = self.branches[branch_id].head.commit.expect("filtered above");
            commit::queue_branch_ref(self.sink, &refname, commit);
        }
        self.sink.commit_refs_update()?;
        Ok(())
    }

    /// The current branch list, for diagnostics and tests.
    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
}

fn ancestor_is_leaf(tree: &Entry<String>, path: &str) -> bool {
    let components: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if components.len() < 2 {
        return false;
    }
    let mut prefix = String::new();
    for component in &components[..components.len() - 1] {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(component);
        if matches!(tree.get(&prefix), Some(Entry::Leaf(_))) {
            return true;
        }
    }
    false
}

/// Error from [`Orchestrator::run`]: either the reader failed, or history
/// processing did.
#[derive(Debug)]
pub enum RunError<E> {
    /// The changeset reader returned an error.
    Reader(E),
    /// Node application or commit assembly failed.
    History(HistoryError),
}

impl<E: fmt::Display> fmt::Display for RunError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(e) => write!(f, "reader error: {e}"),
            Self::History(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RunError<E> {}

impl<E> From<HistoryError> for RunError<E> {
    fn from(e: HistoryError) -> Self {
        Self::History(e)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hg2git_git::MemorySink;

    use super::*;
    use crate::object_model::FileProps;

    fn revision(rev: u64, rev_id: &str, branch: &str, parents: Vec<&str>, nodes: Vec<RevisionNode>) -> InputRevision {
        InputRevision {
            rev,
            rev_id: rev_id.to_owned(),
            author: "Jane Doe <jane@example.com>".to_owned(),
            log: "change".to_owned(),
            datetime: "0 +0000".to_owned(),
            branch_name: branch.to_owned(),
            parents: parents.into_iter().map(ToOwned::to_owned).collect(),
            children: Vec::new(),
            extra: BTreeMap::new(),
            nodes,
        }
    }

    #[test]
    fn single_revision_creates_one_commit() {
        let config = ProjectMapping::builtin_default();
        let mut sink = MemorySink::new();
        let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

        let rev = revision(
            0,
            "r0",
            "default",
            vec![],
            vec![
                RevisionNode::BranchAdd { name: "default".to_owned() },
                RevisionNode::FileChange {
                    path: "README".to_owned(),
                    data: b"hello".to_vec(),
                    props: FileProps::default(),
                },
            ],
        );
        orch.apply_revision(rev).unwrap();
        assert_eq!(orch.branches().len(), 1);
        assert!(orch.branches()[0].head.commit.is_some());
    }

    #[test]
    fn second_revision_with_no_changes_elides_commit() {
        let config = ProjectMapping::builtin_default();
        let mut sink = MemorySink::new();
        let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

        orch.apply_revision(revision(
            0,
            "r0",
            "default",
            vec![],
            vec![
                RevisionNode::BranchAdd { name: "default".to_owned() },
                RevisionNode::FileChange {
                    path: "README".to_owned(),
                    data: b"hello".to_vec(),
                    props: FileProps::default(),
                },
            ],
        ))
        .unwrap();
        let first_commit = orch.branches()[0].head.commit;

        orch.apply_revision(revision(1, "r1", "default", vec!["r0"], vec![])).unwrap();
        assert_eq!(orch.branches()[0].head.commit, first_commit, "unchanged tree must elide a new commit");
    }

    #[test]
    fn finalize_writes_branch_ref() {
        let config = ProjectMapping::builtin_default();
        let mut sink = MemorySink::new();
        let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());
        orch.apply_revision(revision(
            0,
            "r0",
            "default",
            vec![],
            vec![
                RevisionNode::BranchAdd { name: "default".to_owned() },
                RevisionNode::FileChange {
                    path: "README".to_owned(),
                    data: b"hello".to_vec(),
                    props: FileProps::default(),
                },
            ],
        ))
        .unwrap();
        orch.finalize().unwrap();
        let refname = RefName::new("refs/heads/main").unwrap();
        assert!(sink.read_ref(&refname).unwrap().is_some());
    }

    #[test]
    fn blocked_branch_never_commits() {
        let config = ProjectMapping::parse(
            r#"<config><project name="p"><branch glob="secret" refname=""/></project></config>"#,
        )
        .unwrap();
        let mut sink = MemorySink::new();
        let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());
        orch.apply_revision(revision(
            0,
            "r0",
            "secret",
            vec![],
            vec![
                RevisionNode::BranchAdd { name: "secret".to_owned() },
                RevisionNode::FileChange {
                    path: "a".to_owned(),
                    data: b"x".to_vec(),
                    props: FileProps::default(),
                },
            ],
        ))
        .unwrap();
        assert!(orch.branches()[0].head.commit.is_none());
    }
}
