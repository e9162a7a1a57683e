//! Foundation types for stow.
//!
//! This crate provides the node model shared by every storage backend and
//! every traversal. All other stow crates depend on `stow-types`.
//!
//! # Key Types
//!
//! - [`LeafValue`] / [`LeafKind`] — Typed primitives stored under a name
//! - [`FlagSet`] — Field-less enums persisted as sets of member names
//! - [`Context`] — The three node-kind contexts a cursor can sit in
//! - [`Tree`] — Arena-backed explicit tree of complex and array nodes
//! - [`SessionId`] / [`LockId`] — Identities for sessions and traversal locks
//! - [`StoreError`] — The shared error type for every backend

pub mod error;
pub mod node;
pub mod session;
pub mod tree;
pub mod value;

pub use error::{StoreError, StoreResult};
pub use node::{Context, EntryKind, EntryInfo, NodeId};
pub use session::{LockId, SessionId};
pub use tree::{Entry, Tree};
pub use value::{join_flags, split_flags, FlagSet, LeafKind, LeafValue};
