//! XML document backend for stow.
//!
//! The session's nodes are the elements of a live, mutable [`Document`]:
//!
//! - a complex is an element; its scalar leaves are attributes in their
//!   canonical text form
//! - a string leaf is a child element whose text is the value
//! - a string array is a child element marked `type="strings"` holding one
//!   `entry` element per value
//! - an array is an element marked `type="array"` whose elements are `item`
//!   children, positioned by document order
//!
//! The reserved vocabulary is configurable through [`MarkupConfig`].

pub mod config;
pub mod document;
pub mod names;
pub mod store;

pub use config::MarkupConfig;
pub use document::Document;
pub use names::validate_name;
pub use store::MarkupStore;
