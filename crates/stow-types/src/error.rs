use thiserror::Error;

use crate::node::Context;
use crate::session::LockId;

/// Errors produced by traversal, backends, and codecs.
///
/// The variants fall into two disjoint classes. Data-shape errors
/// ([`EntryNotFound`](StoreError::EntryNotFound) and
/// [`IncompatibleType`](StoreError::IncompatibleType)) are expected outcomes
/// of looking up a name that is absent or of the wrong kind; callers usually
/// recover from them by substituting a default. Everything else signals a
/// caller invariant violation or a broken stream and should propagate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry with this name exists in the current context.
    #[error("entry not found: {name:?}")]
    EntryNotFound { name: String },

    /// An entry exists but is not of the requested kind.
    #[error("entry {name:?} is not {expected}")]
    IncompatibleType { name: String, expected: &'static str },

    /// The operation is not valid in the cursor's current context.
    #[error("{operation} is not valid in {context} context")]
    WrongContext {
        operation: &'static str,
        context: Context,
    },

    /// Array element index outside `[0, len)`.
    #[error("array index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A bookmark or lock handle was produced by a different session.
    #[error("bookmark was not created by this session")]
    MismatchedBookmark,

    /// A bookmark refers to a node that has since been detached.
    #[error("bookmark refers to a detached node")]
    StaleBookmark,

    /// The requested traversal would ascend past a locked node.
    #[error("traversal would cross lock {lock}")]
    DataLock { lock: LockId },

    /// The lock is not registered with this session.
    #[error("lock {0} is not registered")]
    UnknownLock(LockId),

    /// The session has been sealed and no longer accepts mutations.
    #[error("store is read-only")]
    ReadOnly,

    /// The name collides with the backend's reserved vocabulary.
    #[error("name {0:?} is reserved")]
    ReservedName(String),

    /// The name cannot be represented by the backend.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A name or payload exceeds the wire format's length prefix.
    #[error("{what} too long: {len} bytes (max {max})")]
    TooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream is malformed or truncated.
    #[error("corrupt stream at offset {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    /// The markup document could not be parsed or written.
    #[error("markup error: {0}")]
    Markup(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::EntryNotFound`].
    pub fn not_found(name: &str) -> Self {
        Self::EntryNotFound {
            name: name.to_string(),
        }
    }

    /// Shorthand for [`StoreError::IncompatibleType`].
    pub fn incompatible(name: &str, expected: &'static str) -> Self {
        Self::IncompatibleType {
            name: name.to_string(),
            expected,
        }
    }

    /// Returns `true` for the recoverable data-shape class.
    pub fn is_data_shape(&self) -> bool {
        matches!(
            self,
            Self::EntryNotFound { .. } | Self::IncompatibleType { .. }
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
