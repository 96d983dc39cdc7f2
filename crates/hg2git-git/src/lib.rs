//! Git object-sink abstraction for the hg2git conversion engine.
//!
//! [`GitSink`] is the single boundary between the conversion core and git;
//! [`GixSink`] is the production backend (built on
//! [gix](https://github.com/GitoxideLabs/gitoxide)), and [`MemorySink`] is an
//! in-memory test double used by this crate's tests and by `hg2git-core`'s
//! scenario tests.

mod error;
mod gix_sink;
mod memory_sink;
mod sink;
mod types;

pub use error::GitError;
pub use gix_sink::GixSink;
pub use memory_sink::MemorySink;
pub use sink::GitSink;
pub use types::{
    EntryMode, GitOid, IndexUpdate, OidParseError, QueuedRefUpdate, RefName, RefNameError,
    Signature, TagProps, TreeEntry,
};
