//! Project configuration: branch-name → refname mapping, tag mapping,
//! per-branch message-edit rules, and gitattributes overrides.
//!
//! Parsed from the XML file named by `--config FILE`. Missing file → a
//! single default project with a `default → refs/heads/main` branch
//! mapping, matching the upstream tool's built-in fallback.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// The compiled project mapping: an ordered list of projects, each
/// contributing its own branch map.
///
/// `map_branch`/`map_tag` consult projects in order and return the first
/// match.
#[derive(Clone, Debug, Default)]
pub struct ProjectMapping {
    /// Projects in declaration order.
    pub projects: Vec<ProjectConfig>,
}

impl ProjectMapping {
    /// The built-in single-project default used when `--no-default-config`
    /// is not set and no `--config FILE` is given: `default` branch maps to
    /// `refs/heads/main`, everything else is unmapped.
    #[must_use]
    pub fn builtin_default() -> Self {
        Self {
            projects: vec![ProjectConfig {
                name: "default".to_owned(),
                branches: vec![BranchMap {
                    glob: "default".to_owned(),
                    refname_template: "refs/heads/main".to_owned(),
                    revisions_ref_template: None,
                    edit_rules: Vec::new(),
                    tag_map: Vec::new(),
                    gitattributes: Vec::new(),
                }],
            }],
        }
    }

    /// Load and compile a project mapping from an XML file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or fails to parse
    /// or compile (e.g. an invalid regex in an edit rule).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError {
            path: Some(path.to_owned()),
            message: format!("could not read file: {e}"),
        })?;
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse and compile a project mapping from an XML string.
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed XML or an uncompilable regex.
    pub fn parse(xml: &str) -> Result<Self, ConfigError> {
        let raw: RawProjectMapping = quick_xml::de::from_str(xml).map_err(|e| ConfigError {
            path: None,
            message: format!("invalid config XML: {e}"),
        })?;

        let mut projects = Vec::with_capacity(raw.project.len());
        for project in raw.project {
            let mut branches = Vec::with_capacity(project.branch.len());
            for branch in project.branch {
                let mut edit_rules = Vec::with_capacity(branch.edit_message.len());
                for rule in branch.edit_message {
                    edit_rules.push(EditRule::compile(rule)?);
                }
                branches.push(BranchMap {
                    glob: branch.glob,
                    refname_template: branch.refname,
                    revisions_ref_template: branch.revisions_ref,
                    edit_rules,
                    tag_map: project_tag_map(&project.tag),
                    gitattributes: branch
                        .gitattributes
                        .into_iter()
                        .map(|a| (a.path, a.value))
                        .collect(),
                });
            }
            projects.push(ProjectConfig {
                name: project.name,
                branches,
            });
        }

        Ok(Self { projects })
    }

    /// Find the first branch map whose glob matches `name`.
    ///
    /// Returns `None` if no project's branch map matches at all (the branch
    /// is not projected). An explicit empty `refname_template` on a matched
    /// map is a deliberate block, distinct from "no match" — callers
    /// distinguish by checking [`BranchMap::is_blocked`].
    #[must_use]
    pub fn map_branch(&self, name: &str) -> Option<&BranchMap> {
        self.projects
            .iter()
            .flat_map(|p| &p.branches)
            .find(|b| glob_match(&b.glob, name))
    }

    /// Resolve a tag label to a refname.
    ///
    /// Returns `Some(Some(refname))` when mapped, `Some(None)` when
    /// explicitly unmapped (empty target — warn and drop), or `None` when no
    /// rule names this tag at all (also warn and drop).
    #[must_use]
    pub fn map_tag(&self, label: &str) -> Option<Option<&str>> {
        self.projects.iter().find_map(|p| {
            p.branches.iter().find_map(|b| {
                b.tag_map.iter().find_map(|(glob, target)| {
                    glob_match(glob, label).then_some(if target.is_empty() {
                        None
                    } else {
                        Some(target.as_str())
                    })
                })
            })
        })
    }
}

/// One configured project: a name plus its branch map list.
#[derive(Clone, Debug)]
pub struct ProjectConfig {
    /// Project name, used only for diagnostics.
    pub name: String,
    /// Branch maps, consulted in declaration order.
    pub branches: Vec<BranchMap>,
}

/// Maps a glob-matched source branch name to an output refname template,
/// plus everything else that only makes sense per-branch: message-edit
/// rules, tag mapping, and gitattributes overrides.
#[derive(Clone, Debug)]
pub struct BranchMap {
    /// Git-style glob matched against the source branch name.
    pub glob: String,
    /// Output refname, e.g. `refs/heads/main`. Empty means "block": the
    /// branch matches but must not be created.
    pub refname_template: String,
    /// Optional per-revision ref template; when absent, the default
    /// substitution rule (replace the `refs/heads/`/`refs/` prefix with
    /// `refs/revisions/`) applies.
    pub revisions_ref_template: Option<String>,
    /// Message-edit rules, applied in declaration order.
    pub edit_rules: Vec<EditRule>,
    /// Tag-name glob → refname-template pairs, consulted in order.
    pub tag_map: Vec<(String, String)>,
    /// Path glob → gitattributes line, applied to matching blobs.
    pub gitattributes: Vec<(String, String)>,
}

impl BranchMap {
    /// An explicitly empty refname template blocks branch creation.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.refname_template.is_empty()
    }

    /// Resolve the per-revision ref for revision number `rev`, given the
    /// already-resolved branch refname.
    ///
    /// Uses [`BranchMap::revisions_ref_template`] if present; otherwise
    /// applies the default rule: replace a leading `refs/heads/` or `refs/`
    /// with `refs/revisions/`, then append `/r<rev>`.
    #[must_use]
    pub fn revisions_ref(&self, resolved_refname: &str, rev: u64) -> String {
        if let Some(template) = &self.revisions_ref_template {
            return template.replace("{rev}", &rev.to_string());
        }
        let tail = resolved_refname
            .strip_prefix("refs/heads/")
            .or_else(|| resolved_refname.strip_prefix("refs/"))
            .unwrap_or(resolved_refname);
        format!("refs/revisions/{tail}/r{rev}")
    }
}

/// A single message-edit rule: find `pattern`, replace with
/// `replacement`, applied at most `max_count` times (0 = unlimited), only
/// when the current revision id or rev number is in `rev_filter` (if set).
/// If `is_final` and the rule matched, no further rules run.
#[derive(Clone, Debug)]
pub struct EditRule {
    /// Compiled match pattern.
    pub pattern: Regex,
    /// Replacement text (supports `$1`-style capture references).
    pub replacement: String,
    /// Maximum number of replacements to perform; `0` means unlimited.
    pub max_count: usize,
    /// When true, a match halts further rule processing for this message.
    pub is_final: bool,
    /// Optional filter: only apply to revisions whose number falls in this
    /// range.
    pub rev_filter: Option<RevRange>,
}

impl EditRule {
    fn compile(raw: RawEditRule) -> Result<Self, ConfigError> {
        let pattern = Regex::new(&raw.pattern).map_err(|e| ConfigError {
            path: None,
            message: format!("invalid edit-message pattern '{}': {e}", raw.pattern),
        })?;
        let rev_filter = raw
            .revs
            .as_deref()
            .map(RevRange::parse)
            .transpose()
            .map_err(|e| ConfigError {
                path: None,
                message: format!("invalid rev-range '{}': {e}", raw.revs.unwrap_or_default()),
            })?;
        Ok(Self {
            pattern,
            replacement: raw.replacement.unwrap_or_default(),
            max_count: raw.max.unwrap_or(0),
            is_final: raw.r#final.unwrap_or(false),
            rev_filter,
        })
    }

    /// Apply this rule to `text`, returning the edited text and whether it
    /// matched at least once.
    #[must_use]
    pub fn apply(&self, text: &str, rev: u64) -> (String, bool) {
        if let Some(range) = &self.rev_filter
            && !range.contains(rev)
        {
            return (text.to_owned(), false);
        }
        let limit = if self.max_count == 0 {
            usize::MAX
        } else {
            self.max_count
        };
        let mut matched = false;
        let mut count = 0;
        let result = self.pattern.replace_all(text, |caps: &regex::Captures| {
            if count >= limit {
                return caps[0].to_owned();
            }
            matched = true;
            count += 1;
            let mut expanded = String::new();
            caps.expand(&self.replacement, &mut expanded);
            expanded
        });
        (result.into_owned(), matched)
    }
}

/// A revision-number range, as used to scope an edit rule to part of history.
/// Parsed from `"N"`, `"N-M"`, `"N-"`, or `"-M"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevRange {
    /// Inclusive lower bound, if any.
    pub from: Option<u64>,
    /// Inclusive upper bound, if any.
    pub to: Option<u64>,
}

impl RevRange {
    /// Parse a rev-range specification.
    ///
    /// # Errors
    /// Returns an error string if the specification is malformed.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        if let Some((from, to)) = spec.split_once('-') {
            let from = if from.is_empty() {
                None
            } else {
                Some(
                    from.parse()
                        .map_err(|_| format!("invalid rev-range start '{from}'"))?,
                )
            };
            let to = if to.is_empty() {
                None
            } else {
                Some(
                    to.parse()
                        .map_err(|_| format!("invalid rev-range end '{to}'"))?,
                )
            };
            Ok(Self { from, to })
        } else {
            let n = spec
                .parse()
                .map_err(|_| format!("invalid rev-range '{spec}'"))?;
            Ok(Self {
                from: Some(n),
                to: Some(n),
            })
        }
    }

    /// Returns `true` if `rev` falls within this range.
    #[must_use]
    pub fn contains(&self, rev: u64) -> bool {
        self.from.is_none_or(|from| rev >= from) && self.to.is_none_or(|to| rev <= to)
    }
}

/// Error loading or compiling a project configuration.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded, if available.
    pub path: Option<std::path::PathBuf>,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

/// Glob matcher supporting `*` (any run of characters) and `?` (any single
/// character); patterns without wildcards require an exact match. Backed by
/// the `glob` crate, the same one the teacher depends on for path-pattern
/// matching elsewhere.
///
/// Shared with [`crate::orchestrator`] for matching gitattributes path
/// globs against staged file paths — same syntax, same matcher. An
/// unparseable pattern never matches rather than erroring, since branch/tag
/// globs are free-form user config, not validated ahead of time.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    glob::Pattern::new(pattern).is_ok_and(|p| p.matches(text))
}

fn project_tag_map(raw: &[RawTag]) -> Vec<(String, String)> {
    raw.iter()
        .map(|t| (t.glob.clone(), t.refname.clone().unwrap_or_default()))
        .collect()
}

// ---------------------------------------------------------------------------
// Raw XML shape (deserialized directly, then compiled into the above)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
struct RawProjectMapping {
    #[serde(rename = "project", default)]
    project: Vec<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "branch", default)]
    branch: Vec<RawBranch>,
    #[serde(rename = "tag", default)]
    tag: Vec<RawTag>,
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    #[serde(rename = "@glob")]
    glob: String,
    #[serde(rename = "@refname")]
    refname: String,
    #[serde(rename = "@revisions-ref", default)]
    revisions_ref: Option<String>,
    #[serde(rename = "edit-message", default)]
    edit_message: Vec<RawEditRule>,
    #[serde(rename = "gitattributes", default)]
    gitattributes: Vec<RawGitattribute>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    #[serde(rename = "@glob")]
    glob: String,
    #[serde(rename = "@refname", default)]
    refname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEditRule {
    #[serde(rename = "@pattern")]
    pattern: String,
    #[serde(rename = "@replacement", default)]
    replacement: Option<String>,
    #[serde(rename = "@max", default)]
    max: Option<usize>,
    #[serde(rename = "@final", default)]
    r#final: Option<bool>,
    #[serde(rename = "@revs", default)]
    revs: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGitattribute {
    #[serde(rename = "@path")]
    path: String,
    #[serde(rename = "@value")]
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_default_maps_default_branch() {
        let cfg = ProjectMapping::builtin_default();
        let map = cfg.map_branch("default").unwrap();
        assert_eq!(map.refname_template, "refs/heads/main");
    }

    #[test]
    fn builtin_default_has_no_other_mappings() {
        let cfg = ProjectMapping::builtin_default();
        assert!(cfg.map_branch("feature").is_none());
    }

    #[test]
    fn parse_simple_project() {
        let xml = r#"
<config>
  <project name="main">
    <branch glob="default" refname="refs/heads/main"/>
    <branch glob="*" refname="refs/heads/{name}"/>
  </project>
</config>
"#;
        let cfg = ProjectMapping::parse(xml).unwrap();
        assert_eq!(cfg.projects.len(), 1);
        assert_eq!(cfg.projects[0].branches.len(), 2);
        assert_eq!(
            cfg.map_branch("default").unwrap().refname_template,
            "refs/heads/main"
        );
        assert_eq!(
            cfg.map_branch("anything").unwrap().refname_template,
            "refs/heads/{name}"
        );
    }

    #[test]
    fn parse_rejects_invalid_regex() {
        let xml = r#"
<config>
  <project name="main">
    <branch glob="default" refname="refs/heads/main">
      <edit-message pattern="[unterminated" replacement=""/>
    </branch>
  </project>
</config>
"#;
        assert!(ProjectMapping::parse(xml).is_err());
    }

    #[test]
    fn rev_range_parsing() {
        assert_eq!(
            RevRange::parse("5").unwrap(),
            RevRange {
                from: Some(5),
                to: Some(5)
            }
        );
        assert_eq!(
            RevRange::parse("5-10").unwrap(),
            RevRange {
                from: Some(5),
                to: Some(10)
            }
        );
        assert_eq!(
            RevRange::parse("5-").unwrap(),
            RevRange {
                from: Some(5),
                to: None
            }
        );
        assert_eq!(
            RevRange::parse("-10").unwrap(),
            RevRange {
                from: None,
                to: Some(10)
            }
        );
    }

    #[test]
    fn rev_range_contains() {
        let range = RevRange::parse("5-10").unwrap();
        assert!(!range.contains(4));
        assert!(range.contains(5));
        assert!(range.contains(10));
        assert!(!range.contains(11));
    }

    #[test]
    fn glob_match_wildcards() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("feature/*", "feature/x"));
        assert!(!glob_match("feature/*", "other/x"));
        assert!(glob_match("default", "default"));
        assert!(!glob_match("default", "Default"));
    }

    #[test]
    fn edit_rule_applies_within_rev_filter() {
        let rule = EditRule {
            pattern: Regex::new(r"TODO").unwrap(),
            replacement: "DONE".to_owned(),
            max_count: 0,
            is_final: false,
            rev_filter: Some(RevRange::parse("1-5").unwrap()),
        };
        let (text, matched) = rule.apply("TODO: fix", 3);
        assert!(matched);
        assert_eq!(text, "DONE: fix");

        let (text2, matched2) = rule.apply("TODO: fix", 10);
        assert!(!matched2);
        assert_eq!(text2, "TODO: fix");
    }

    #[test]
    fn branch_map_default_revisions_ref() {
        let map = BranchMap {
            glob: "default".to_owned(),
            refname_template: "refs/heads/main".to_owned(),
            revisions_ref_template: None,
            edit_rules: Vec::new(),
            tag_map: Vec::new(),
            gitattributes: Vec::new(),
        };
        assert_eq!(map.revisions_ref("refs/heads/main", 7), "refs/revisions/main/r7");
    }
}
