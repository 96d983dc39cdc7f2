//! Core history-to-branch projection engine for `hg2git`.
//!
//! This crate never touches Mercurial or git directly: [`reader`] defines
//! the contract a source-history adapter implements, [`hg2git_git::GitSink`]
//! is the equivalent contract for the output side, and everything in
//! between — the path tree, the object model, the per-revision projector,
//! branch state, commit assembly, and the orchestrator that ties them
//! together — is pure with respect to both.

pub mod branch;
pub mod commit;
pub mod config;
pub mod hgeol;
pub mod hgignore;
pub mod object_model;
pub mod orchestrator;
pub mod pathtree;
pub mod progress;
pub mod projector;
pub mod reader;

pub use commit::{CommitError, CommitOptions};
pub use config::{ConfigError, ProjectMapping};
pub use orchestrator::{HistoryError, Orchestrator, RunError};
pub use progress::{NoopProgress, ProgressSink, ProgressStats};
pub use reader::{ChangesetReader, InputRevision, RevisionNode};
