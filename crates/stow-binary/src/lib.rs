//! Binary backend for stow.
//!
//! A session is built in memory as an explicit [`Tree`](stow_types::Tree) and
//! emitted on save as a flat, depth-first tag-length-value stream. Reading
//! parses the whole stream back into a tree before any navigation.
//!
//! # Wire format
//!
//! Each entry is a one-byte ASCII [`Tag`], a u16-length-prefixed UTF-8 name
//! (omitted for array elements), and a payload. Numbers are fixed-width
//! big-endian. Containers run until a matching `z` end tag; the root has no
//! end tag and runs to end of input.

pub mod decode;
pub mod encode;
pub mod hexdump;
pub mod memory;
pub mod store;
pub mod tag;

pub use decode::decode;
pub use encode::encode;
pub use hexdump::hex_dump;
pub use memory::MemoryStore;
pub use store::BinaryStore;
pub use tag::Tag;
