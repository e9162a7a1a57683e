//! Object-graph marshalling for stow.
//!
//! Rust values are written into any [`Cursor`](stow_cursor::Cursor) and read
//! back without knowing which backend holds them.
//!
//! # Layers
//!
//! - [`Marshal`] — how one value lays itself out: a leaf, a string array, an
//!   array of elements, an array of `key`/`value` pairs, or a nested complex.
//!   Implemented for primitives, `String`, `Option`, the std sequences, sets
//!   and maps, and every [`Persist`] type.
//! - [`Persist`] — user types with a type name and a list of
//!   [`FieldDescriptor`]s. Overriding `save_store_data`/`load_store_data`
//!   takes over persistence for a type.
//! - [`Marshaller`] — entry point; owns the [`MarshalConfig`], the
//!   [`TypeRegistry`] used to resolve type tags, and a per-type descriptor
//!   cache.
//! - [`Cached`] — a lazily resolved reference persisted by key only.
//!
//! Reads never fail outward. A missing or mis-shaped field keeps its default
//! and the rest of the object is still read.

pub mod cached;
pub mod config;
pub mod descriptor;
pub mod marshal;
pub mod registry;

pub use cached::{Cached, Resolve};
pub use config::MarshalConfig;
pub use descriptor::{FieldDescriptor, Layout, Persist};
pub use marshal::{Flags, Marshal, Marshaller};
pub use registry::TypeRegistry;
