//! End-to-end scenario tests against `MemorySink`, covering the literal
//! walkthrough scenarios and the cross-cutting testable properties.

use std::collections::BTreeMap;

use hg2git_core::commit::CommitOptions;
use hg2git_core::config::ProjectMapping;
use hg2git_core::object_model::FileProps;
use hg2git_core::orchestrator::Orchestrator;
use hg2git_core::reader::{InputRevision, RevisionNode};
use hg2git_git::MemorySink;

fn config() -> ProjectMapping {
    ProjectMapping::parse(
        r#"<config>
            <project name="p">
                <branch glob="*" refname="refs/heads/{name}">
                    <tag glob="*" refname="refs/tags/{name}"/>
                </branch>
            </project>
        </config>"#,
    )
    .expect("valid test config")
}

fn file_change(path: &str, data: &[u8]) -> RevisionNode {
    RevisionNode::FileChange {
        path: path.to_owned(),
        data: data.to_vec(),
        props: FileProps::default(),
    }
}

fn revision(rev: u64, rev_id: &str, branch: &str, parents: &[&str], log: &str, nodes: Vec<RevisionNode>) -> InputRevision {
    InputRevision {
        rev,
        rev_id: rev_id.to_owned(),
        author: "Jane Doe <jane@example.com>".to_owned(),
        log: log.to_owned(),
        datetime: "1000000 +0000".to_owned(),
        branch_name: branch.to_owned(),
        parents: parents.iter().map(|s| (*s).to_owned()).collect(),
        children: Vec::new(),
        extra: BTreeMap::new(),
        nodes,
    }
}

fn cherrypick_revision(rev: u64, rev_id: &str, branch: &str, parents: &[&str], log: &str, source_rev_id: &str, nodes: Vec<RevisionNode>) -> InputRevision {
    let mut rev = revision(rev, rev_id, branch, parents, log, nodes);
    rev.extra.insert("source".to_owned(), source_rev_id.to_owned());
    rev
}

/// S1: a single linear branch producing one commit per revision, each
/// with a resolvable per-revision ref.
#[test]
fn s1_linear_branch_three_commits() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "initial",
        vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change("README", b"one")],
    ))
    .unwrap();
    orch.apply_revision(revision(1, "r1", "default", &["r0"], "second", vec![file_change("README", b"two")]))
        .unwrap();
    orch.apply_revision(revision(2, "r2", "default", &["r1"], "third", vec![file_change("README", b"three")]))
        .unwrap();

    assert_eq!(orch.branches().len(), 1);
    let branch = &orch.branches()[0];
    assert_eq!(branch.revisions.len(), 3);
    assert!(branch.revisions.iter().all(|r| r.commit.is_some()), "every revision with a real change must commit");

    let commits: Vec<_> = branch.revisions.iter().map(|r| r.commit.unwrap()).collect();
    assert_eq!(commits.len(), 3);
    assert_ne!(commits[0], commits[1]);
    assert_ne!(commits[1], commits[2]);
    assert_eq!(sink.commit_parents(commits[1]), Some(&[commits[0]][..]));
    assert_eq!(sink.commit_parents(commits[2]), Some(&[commits[1]][..]));

    orch.finalize().unwrap();
}

/// S2: a branch split — a child changeset on a new branch name still
/// inherits the parent's tree at the point of the split.
#[test]
fn s2_branch_split_inherits_tree() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "initial",
        vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change("shared.txt", b"base")],
    ))
    .unwrap();

    orch.apply_revision(revision(
        1,
        "r1",
        "feature",
        &["r0"],
        "split onto feature",
        vec![RevisionNode::BranchAdd { name: "feature".to_owned() }, file_change("feature.txt", b"new")],
    ))
    .unwrap();

    assert_eq!(orch.branches().len(), 2);
    let feature = &orch.branches()[1];
    let feature_commit = feature.revisions[0].commit.unwrap();
    let tree = sink.tree(sink.commit_tree_oid(feature_commit).unwrap()).unwrap();
    let names: Vec<_> = tree.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"shared.txt"), "split branch must inherit the parent's files");
    assert!(names.contains(&"feature.txt"));
}

/// S3: a merge commit has both parents, in order, and its tree reflects
/// the full union of changes (not just a diff against the first parent).
#[test]
fn s3_merge_has_both_parents_and_full_tree() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "initial",
        vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change("a.txt", b"a")],
    ))
    .unwrap();
    orch.apply_revision(revision(
        1,
        "r1",
        "feature",
        &["r0"],
        "branch off",
        vec![RevisionNode::BranchAdd { name: "feature".to_owned() }, file_change("b.txt", b"b")],
    ))
    .unwrap();
    orch.apply_revision(revision(2, "r2", "default", &["r0"], "advance default", vec![file_change("c.txt", b"c")]))
        .unwrap();

    orch.apply_revision(revision(
        3,
        "r3",
        "default",
        &["r2", "r1"],
        "merge feature",
        vec![RevisionNode::BranchParent { rev_id: "r1".to_owned() }],
    ))
    .unwrap();

    let default_branch = &orch.branches()[0];
    let merge_commit = default_branch.revisions.last().unwrap().commit.unwrap();
    let parents = sink.commit_parents(merge_commit).unwrap();
    assert_eq!(parents.len(), 2, "a merge node must produce a two-parent commit");

    let tree = sink.tree(sink.commit_tree_oid(merge_commit).unwrap()).unwrap();
    let names: Vec<_> = tree.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"a.txt") && names.contains(&"b.txt") && names.contains(&"c.txt"), "merge tree must be the full union");
}

/// S4: a changeset tagged with a label produces the configured tag ref.
#[test]
fn s4_tag_produces_ref() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "initial",
        vec![
            RevisionNode::BranchAdd { name: "default".to_owned() },
            file_change("README", b"hi"),
            RevisionNode::Tag { name: "v1.0".to_owned() },
        ],
    ))
    .unwrap();
    orch.finalize().unwrap();

    let tag_ref = hg2git_git::RefName::new("refs/tags/v1.0").unwrap();
    assert!(sink.read_ref(&tag_ref).unwrap().is_some(), "tagged revision must produce refs/tags/v1.0");
}

/// S5: a cherry-pick node records provenance in the commit message and
/// produces a commit with only the direct parent (not the cherry-pick
/// source) as its git parent.
#[test]
fn s5_cherry_pick_footer_and_single_parent() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "initial",
        vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change("a.txt", b"a")],
    ))
    .unwrap();
    orch.apply_revision(revision(
        1,
        "r1",
        "feature",
        &["r0"],
        "fix on feature",
        vec![RevisionNode::BranchAdd { name: "feature".to_owned() }, file_change("fix.txt", b"fix")],
    ))
    .unwrap();
    orch.apply_revision(cherrypick_revision(
        2,
        "r2",
        "default",
        &["r0"],
        "fix on feature",
        "r1",
        vec![file_change("fix.txt", b"fix")],
    ))
    .unwrap();

    let default_branch = &orch.branches()[0];
    let cherry_commit = default_branch.revisions.last().unwrap().commit.unwrap();
    assert_eq!(sink.commit_parents(cherry_commit), Some(&[default_branch.revisions[0].commit.unwrap()][..]));
    let message = sink.commit_message(cherry_commit).unwrap();
    assert!(message.contains("Cherry-picked-from:"), "cherry-pick must leave a provenance footer: {message}");
}

/// S6: `.hgignore` content is translated into `.gitignore` rather than
/// carried through verbatim.
#[test]
fn s6_hgignore_translates_to_gitignore() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    let gitignore_data = hg2git_core::hgignore::hgignore_to_gitignore(b"*.pyc\nsyntax: glob\nbuild/\n");

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "add ignore file",
        vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change(".gitignore", &gitignore_data)],
    ))
    .unwrap();

    let commit = orch.branches()[0].revisions[0].commit.unwrap();
    let tree = sink.tree(sink.commit_tree_oid(commit).unwrap()).unwrap();
    let entry = tree.iter().find(|e| e.name == ".gitignore").expect("translated .gitignore must be present");
    let content = sink.blob(entry.oid).unwrap();
    assert!(!content.starts_with(b"syntax: glob"), "translated content must not carry an hg-only directive verbatim");
}

/// Testable Property: a second revision whose tree is unchanged from its
/// single parent elides its commit entirely.
#[test]
fn property_empty_commit_elision() {
    let config = config();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "default",
        &[],
        "initial",
        vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change("a.txt", b"a")],
    ))
    .unwrap();
    let first = orch.branches()[0].head.commit;
    orch.apply_revision(revision(1, "r1", "default", &["r0"], "no-op metadata-only change", vec![])).unwrap();
    assert_eq!(orch.branches()[0].head.commit, first, "unchanged tree must not produce a new commit object");
}

/// Testable Property: two branches that map to the same output refname
/// resolve to distinct, non-colliding refs.
#[test]
fn property_ref_collision_resolution() {
    let config = ProjectMapping::parse(
        r#"<config><project name="p"><branch glob="*" refname="refs/heads/shared"/></project></config>"#,
    )
    .unwrap();
    let mut sink = MemorySink::new();
    let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());

    orch.apply_revision(revision(
        0,
        "r0",
        "alpha",
        &[],
        "alpha init",
        vec![RevisionNode::BranchAdd { name: "alpha".to_owned() }, file_change("a.txt", b"a")],
    ))
    .unwrap();
    orch.apply_revision(revision(
        1,
        "r1",
        "beta",
        &[],
        "beta init",
        vec![RevisionNode::BranchAdd { name: "beta".to_owned() }, file_change("b.txt", b"b")],
    ))
    .unwrap();
    orch.finalize().unwrap();

    let primary = hg2git_git::RefName::new("refs/heads/shared").unwrap();
    let secondary = hg2git_git::RefName::new("refs/heads/shared___1").unwrap();
    assert!(sink.read_ref(&primary).unwrap().is_some());
    assert!(sink.read_ref(&secondary).unwrap().is_some(), "second branch mapped to the same refname must get a disambiguated ref");
    assert_ne!(sink.read_ref(&primary).unwrap(), sink.read_ref(&secondary).unwrap());
}

/// Testable Property: determinism — running the same revision stream
/// twice against independent sinks produces identical commit trees.
#[test]
fn property_determinism() {
    fn run_once() -> (hg2git_git::GitOid, MemorySink) {
        let config = config();
        let mut sink = MemorySink::new();
        let mut orch = Orchestrator::new(&config, &mut sink, CommitOptions::default());
        orch.apply_revision(revision(
            0,
            "r0",
            "default",
            &[],
            "initial",
            vec![RevisionNode::BranchAdd { name: "default".to_owned() }, file_change("a.txt", b"a")],
        ))
        .unwrap();
        orch.apply_revision(revision(1, "r1", "default", &["r0"], "second", vec![file_change("a.txt", b"a2")]))
            .unwrap();
        let tree = orch.branches()[0].head.committed_tree.unwrap();
        (tree, sink)
    }

    let (tree_a, _sink_a) = run_once();
    let (tree_b, _sink_b) = run_once();
    assert_eq!(tree_a, tree_b, "identical input history must produce identical trees");
}
