//! Error types for the git object-sink crate.

use crate::types::{GitOid, RefName};
use thiserror::Error;

/// Errors a [`GitSink`](crate::GitSink) implementation can return.
#[derive(Debug, Error)]
pub enum GitError {
    /// The underlying object database rejected a read or write.
    #[error("git object store error: {0}")]
    ObjectStore(String),

    /// A ref update failed — typically because the old value didn't match
    /// (a concurrent writer touched the ref) or the name was rejected by
    /// the backend.
    #[error("failed to update ref {name}: {reason}")]
    RefUpdate {
        /// The ref that failed to update.
        name: RefName,
        /// Why it failed.
        reason: String,
    },

    /// A referenced OID does not exist in the object store.
    #[error("object {0} not found")]
    MissingObject(GitOid),

    /// The repository path given to open/init the sink is not usable.
    #[error("repository at {path} is not usable: {reason}")]
    InvalidRepository {
        /// The path that was attempted.
        path: String,
        /// Why it failed.
        reason: String,
    },

    /// Wraps an I/O error encountered while talking to the on-disk store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
