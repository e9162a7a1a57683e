//! The stow traversal protocol.
//!
//! Callers program against [`Cursor`]: a single mutable position that moves
//! through complex, array, and array-element contexts by structural
//! navigation only. Every backend implements it identically, so code written
//! against `&mut dyn Cursor` works unchanged over a binary stream or a markup
//! document.
//!
//! # Layers
//!
//! - [`Cursor`] — the object-safe core contract each backend implements
//! - [`CursorExt`] — typed readers/writers, `*_or` defaults, flag sets
//! - [`Bookmarks`] — saved positions and traversal locks, built on top of a
//!   backend's parent links
//! - [`copy_tree`] — replay a subtree from one backend into another

pub mod bookmark;
pub mod copy;
pub mod traits;

pub use bookmark::{ancestor_path, divergence_index, Bookmark, Bookmarks, LockHandle, LockRegistry};
pub use copy::copy_tree;
pub use traits::{recover, Cursor, CursorExt};

pub use stow_types::{StoreError, StoreResult};
