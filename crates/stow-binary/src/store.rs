use std::io::{Read, Write};
use std::path::Path;

use bytes::Bytes;
use stow_cursor::{Bookmarks, Cursor, LockRegistry};
use stow_types::{
    Context, EntryInfo, LeafKind, LeafValue, NodeId, SessionId, StoreError, StoreResult, Tree,
};
use tracing::{debug, warn};

use crate::decode::{decode, decode_reader};
use crate::encode::{encode, validate_leaf, validate_name};

/// A binary-backend session.
///
/// A store built with [`BinaryStore::new`] accepts mutations until it is
/// sealed, either explicitly or by [`BinaryStore::save`]. A store decoded
/// from bytes is sealed from the start. Navigation, reads, bookmarks and
/// locks work in both modes.
#[derive(Debug)]
pub struct BinaryStore {
    tree: Tree,
    cursor: NodeId,
    session: SessionId,
    locks: LockRegistry<NodeId>,
    sealed: bool,
}

impl Default for BinaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryStore {
    /// Start a new, writable session over an empty root.
    pub fn new() -> Self {
        Self::with_tree(Tree::new(), false)
    }

    fn with_tree(tree: Tree, sealed: bool) -> Self {
        let cursor = tree.root();
        Self {
            tree,
            cursor,
            session: SessionId::generate(),
            locks: LockRegistry::new(),
            sealed,
        }
    }

    /// Decode a complete stream into a read-only session.
    pub fn from_bytes(data: impl Into<Bytes>) -> StoreResult<Self> {
        Ok(Self::with_tree(decode(data)?, true))
    }

    /// Read a stream to its end and decode it into a read-only session.
    pub fn from_reader<R: Read>(reader: R) -> StoreResult<Self> {
        Ok(Self::with_tree(decode_reader(reader)?, true))
    }

    /// Open a store file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = data.len(), "opening binary store");
        Self::from_bytes(data)
    }

    /// Encode the current tree without sealing.
    pub fn to_bytes(&self) -> StoreResult<Bytes> {
        encode(&self.tree)
    }

    /// Seal the session and write the encoded tree to `out`.
    ///
    /// Writing is best-effort: an encoding or I/O failure is logged and
    /// reported as `false`, never raised.
    pub fn save<W: Write>(&mut self, out: &mut W) -> bool {
        self.sealed = true;
        let bytes = match self.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to encode binary store");
                return false;
            }
        };
        match out.write_all(&bytes).and_then(|()| out.flush()) {
            Ok(()) => {
                debug!(bytes = bytes.len(), "saved binary store");
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to write binary store");
                false
            }
        }
    }

    /// Seal the session and write it to a file, propagating failures.
    pub fn save_to_path(&mut self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.sealed = true;
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "saved binary store");
        Ok(())
    }

    /// Stop accepting mutations.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The underlying node tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn writable(&self) -> StoreResult<()> {
        if self.sealed {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: Context) -> StoreResult<()> {
        let context = self.context();
        if context != allowed {
            return Err(StoreError::WrongContext { operation, context });
        }
        Ok(())
    }

    fn ascend(&mut self) -> StoreResult<()> {
        self.locks.guard_exit(self.cursor)?;
        if let Some(parent) = self.tree.parent(self.cursor) {
            self.cursor = parent;
        }
        Ok(())
    }
}

impl Cursor for BinaryStore {
    fn context(&self) -> Context {
        self.tree.context(self.cursor)
    }

    fn enter_complex(&mut self, name: &str) -> StoreResult<()> {
        self.cursor = self.tree.child(self.cursor, name, false)?;
        Ok(())
    }

    fn enter_array(&mut self, name: &str) -> StoreResult<()> {
        self.cursor = self.tree.child(self.cursor, name, true)?;
        Ok(())
    }

    fn enter_array_element(&mut self, index: usize) -> StoreResult<()> {
        self.cursor = self.tree.element(self.cursor, index)?;
        Ok(())
    }

    fn exit_complex(&mut self) -> StoreResult<()> {
        self.require("exit_complex", Context::Complex)?;
        if self.cursor == self.tree.root() {
            return Err(StoreError::WrongContext {
                operation: "exit_complex at root",
                context: Context::Complex,
            });
        }
        self.ascend()
    }

    fn exit_array(&mut self) -> StoreResult<()> {
        self.require("exit_array", Context::Array)?;
        self.ascend()
    }

    fn exit_array_element(&mut self) -> StoreResult<()> {
        self.require("exit_array_element", Context::ArrayElement)?;
        self.ascend()
    }

    fn array_length(&self) -> StoreResult<usize> {
        self.tree.array_len(self.cursor)
    }

    fn create_complex(&mut self, name: &str) -> StoreResult<()> {
        self.writable()?;
        validate_name(name)?;
        self.cursor = self.tree.add_complex(self.cursor, name)?;
        Ok(())
    }

    fn create_array(&mut self, name: &str) -> StoreResult<()> {
        self.writable()?;
        validate_name(name)?;
        self.cursor = self.tree.add_array(self.cursor, name)?;
        Ok(())
    }

    fn create_array_element(&mut self) -> StoreResult<()> {
        self.writable()?;
        self.cursor = self.tree.push_element(self.cursor)?;
        Ok(())
    }

    fn read_leaf(&self, name: &str, kind: LeafKind) -> StoreResult<LeafValue> {
        self.tree.leaf(self.cursor, name, kind).cloned()
    }

    fn write_leaf(&mut self, name: &str, value: LeafValue) -> StoreResult<()> {
        self.writable()?;
        validate_name(name)?;
        validate_leaf(&value)?;
        self.tree.set_leaf(self.cursor, name, value)
    }

    fn entries(&self) -> StoreResult<Vec<EntryInfo>> {
        self.tree.entries(self.cursor)
    }
}

impl Bookmarks for BinaryStore {
    type Node = NodeId;

    fn session_id(&self) -> SessionId {
        self.session
    }

    fn root_node(&self) -> NodeId {
        self.tree.root()
    }

    fn current_node(&self) -> NodeId {
        self.cursor
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        if self.tree.contains(node) {
            self.tree.parent(node)
        } else {
            None
        }
    }

    fn move_to(&mut self, node: NodeId) {
        self.cursor = node;
    }

    fn locks(&self) -> &LockRegistry<NodeId> {
        &self.locks
    }

    fn locks_mut(&mut self) -> &mut LockRegistry<NodeId> {
        &mut self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stow_cursor::CursorExt;

    /// `{name: "test", count: 3, flag: true}`
    fn scenario() -> BinaryStore {
        let mut store = BinaryStore::new();
        store.write_string("name", "test").unwrap();
        store.write_int("count", 3).unwrap();
        store.write_bool("flag", true).unwrap();
        store
    }

    /// root { a { b { c { } } } } with the cursor at root.
    fn nested() -> BinaryStore {
        let mut store = BinaryStore::new();
        store.create_complex("a").unwrap();
        store.create_complex("b").unwrap();
        store.create_complex("c").unwrap();
        store.exit_complex().unwrap();
        store.exit_complex().unwrap();
        store.exit_complex().unwrap();
        store
    }

    // ---------------------------------------------------------------
    // Round trip
    // ---------------------------------------------------------------

    #[test]
    fn concrete_scenario_roundtrip() {
        let mut store = scenario();
        let mut out = Vec::new();
        assert!(store.save(&mut out));
        let reader = BinaryStore::from_bytes(out).unwrap();
        assert_eq!(reader.read_string("name").unwrap(), "test");
        assert_eq!(reader.read_int("count").unwrap(), 3);
        assert!(reader.read_bool("flag").unwrap());
    }

    #[test]
    fn arrays_roundtrip() {
        let mut store = BinaryStore::new();
        store.create_array("items").unwrap();
        for i in 0..3 {
            store.create_array_element().unwrap();
            store.write_long("v", i).unwrap();
            store.exit_array_element().unwrap();
        }
        store.exit_array().unwrap();

        let mut reader = BinaryStore::from_bytes(store.to_bytes().unwrap()).unwrap();
        reader.enter_array("items").unwrap();
        assert_eq!(reader.array_length().unwrap(), 3);
        reader.enter_array_element(2).unwrap();
        assert_eq!(reader.read_long("v").unwrap(), 2);
        reader.exit_array_element().unwrap();
        reader.exit_array().unwrap();
        assert_eq!(reader.context(), Context::Complex);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.stow");
        let mut store = scenario();
        store.save_to_path(&path).unwrap();
        let reader = BinaryStore::open(&path).unwrap();
        assert_eq!(reader.read_string("name").unwrap(), "test");
    }

    #[test]
    fn save_swallows_write_failure() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut store = scenario();
        assert!(!store.save(&mut Full));
        assert!(store.is_sealed());
    }

    // ---------------------------------------------------------------
    // Data-shape errors and defaults
    // ---------------------------------------------------------------

    #[test]
    fn leaf_then_enter_array_is_incompatible() {
        let mut store = scenario();
        assert!(matches!(
            store.enter_array("count"),
            Err(StoreError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn missing_entry_is_not_found() {
        let store = scenario();
        assert!(matches!(
            store.read_int("nothing"),
            Err(StoreError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn wrong_kind_read_is_incompatible() {
        let store = scenario();
        assert!(matches!(
            store.read_long("count"),
            Err(StoreError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn defaults_are_idempotent() {
        let store = scenario();
        for _ in 0..3 {
            assert_eq!(store.read_int_or("nothing", 42), 42);
            assert_eq!(store.read_string_or("count", "fallback"), "fallback");
        }
        assert_eq!(store.read_int_or("count", 42), 3);
    }

    #[test]
    fn try_enter_reports_absence() {
        let mut store = nested();
        assert!(!store.try_enter_array("a").unwrap());
        assert!(!store.try_enter_complex("zzz").unwrap());
        assert!(store.try_enter_complex("a").unwrap());
    }

    // ---------------------------------------------------------------
    // Context rules
    // ---------------------------------------------------------------

    #[test]
    fn mismatched_exits_fail_fast() {
        let mut store = BinaryStore::new();
        assert!(matches!(
            store.exit_array(),
            Err(StoreError::WrongContext { .. })
        ));
        assert!(matches!(
            store.exit_complex(),
            Err(StoreError::WrongContext { .. })
        ));
        store.create_array("a").unwrap();
        assert!(matches!(
            store.exit_complex(),
            Err(StoreError::WrongContext { context: Context::Array, .. })
        ));
        assert!(matches!(
            store.write_int("x", 1),
            Err(StoreError::WrongContext { .. })
        ));
        store.create_array_element().unwrap();
        assert_eq!(store.context(), Context::ArrayElement);
        assert!(store.exit_complex().is_err());
        assert!(store.array_length().is_err());
    }

    #[test]
    fn element_index_out_of_bounds() {
        let mut store = BinaryStore::new();
        store.create_array("a").unwrap();
        assert!(matches!(
            store.enter_array_element(0),
            Err(StoreError::IndexOutOfBounds { index: 0, len: 0 })
        ));
    }

    #[test]
    fn sealed_store_rejects_writes() {
        let mut store = scenario();
        store.seal();
        assert!(matches!(store.write_int("x", 1), Err(StoreError::ReadOnly)));
        assert!(matches!(store.create_complex("c"), Err(StoreError::ReadOnly)));
        assert_eq!(store.read_int("count").unwrap(), 3);
    }

    #[test]
    fn replacing_entry_changes_its_kind() {
        let mut store = scenario();
        store.create_complex("count").unwrap();
        store.exit_complex().unwrap();
        assert!(store.read_int("count").is_err());
        store.write_int("count", 9).unwrap();
        assert_eq!(store.read_int("count").unwrap(), 9);
    }

    #[test]
    fn entries_list_kinds_in_order() {
        let store = scenario();
        let kinds: Vec<_> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.kind.to_string()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("name".to_string(), "string".to_string()),
                ("count".to_string(), "i32".to_string()),
                ("flag".to_string(), "bool".to_string()),
            ]
        );
    }

    // ---------------------------------------------------------------
    // Bookmarks and locks
    // ---------------------------------------------------------------

    #[test]
    fn bookmark_from_other_session_is_rejected() {
        let a = scenario();
        let mut b = scenario();
        let mark = a.create_bookmark();
        assert!(matches!(b.restore(&mark), Err(StoreError::MismatchedBookmark)));
    }

    #[test]
    fn restore_returns_to_position() {
        let mut store = nested();
        store.enter_complex("a").unwrap();
        store.enter_complex("b").unwrap();
        let mark = store.create_bookmark();
        store.exit_complex().unwrap();
        store.exit_complex().unwrap();
        store.restore(&mark).unwrap();
        store.enter_complex("c").unwrap();
    }

    #[test]
    fn restore_to_ancestor_is_not_a_lock_violation() {
        let mut store = nested();
        store.enter_complex("a").unwrap();
        let _lock = store.acquire_lock();
        let mark = store.create_bookmark();
        store.enter_complex("b").unwrap();
        store.enter_complex("c").unwrap();
        store.restore(&mark).unwrap();
        assert_eq!(store.current_node(), mark.node());
    }

    #[test]
    fn restore_above_lock_is_rejected() {
        let mut store = nested();
        let top = store.create_bookmark();
        store.enter_complex("a").unwrap();
        let lock = store.acquire_lock();
        store.enter_complex("b").unwrap();
        assert!(matches!(
            store.restore(&top),
            Err(StoreError::DataLock { lock: id }) if id == lock.id()
        ));
    }

    #[test]
    fn restore_of_detached_node_is_stale() {
        let mut store = nested();
        store.enter_complex("a").unwrap();
        let mark = store.create_bookmark();
        store.exit_complex().unwrap();
        store.write_int("a", 1).unwrap();
        assert!(matches!(store.restore(&mark), Err(StoreError::StaleBookmark)));
    }

    #[test]
    fn exit_past_lock_is_rejected() {
        let mut store = nested();
        store.enter_complex("a").unwrap();
        let lock = store.acquire_lock();
        store.enter_complex("b").unwrap();
        store.exit_complex().unwrap();
        assert!(matches!(
            store.exit_complex(),
            Err(StoreError::DataLock { .. })
        ));
        store.release_lock(&lock, false).unwrap();
        store.exit_complex().unwrap();
    }

    #[test]
    fn release_after_descend_and_return() {
        let mut store = nested();
        store.enter_complex("a").unwrap();
        let lock = store.acquire_lock();
        store.enter_complex("b").unwrap();
        store.enter_complex("c").unwrap();
        store.release_lock(&lock, true).unwrap();
        assert!(store.locks().is_empty());
        // Back at `a`.
        store.enter_complex("b").unwrap();
    }

    #[test]
    fn release_below_inner_lock_fails_and_changes_nothing() {
        let mut store = nested();
        store.enter_complex("a").unwrap();
        let outer = store.acquire_lock();
        store.enter_complex("b").unwrap();
        let inner = store.acquire_lock();
        store.enter_complex("c").unwrap();
        let before = store.current_node();

        assert!(matches!(
            store.release_lock(&outer, true),
            Err(StoreError::DataLock { lock }) if lock == inner.id()
        ));
        assert_eq!(store.current_node(), before);
        assert_eq!(store.locks().len(), 2);

        store.release_lock(&inner, true).unwrap();
        store.release_lock(&outer, true).unwrap();
        assert!(store.locks().is_empty());
    }

    #[test]
    fn releasing_twice_is_unknown() {
        let mut store = nested();
        let lock = store.acquire_lock();
        store.release_lock(&lock, false).unwrap();
        assert!(matches!(
            store.release_lock(&lock, false),
            Err(StoreError::UnknownLock(_))
        ));
    }

    #[test]
    fn lock_from_other_session_is_rejected() {
        let mut a = nested();
        let mut b = nested();
        let lock = a.acquire_lock();
        assert!(matches!(
            b.release_lock(&lock, false),
            Err(StoreError::MismatchedBookmark)
        ));
    }

    #[test]
    fn locks_inside_arrays() {
        let mut store = BinaryStore::new();
        store.create_array("a").unwrap();
        store.create_array_element().unwrap();
        let lock = store.acquire_lock();
        store.create_complex("x").unwrap();
        store.exit_complex().unwrap();
        assert!(store.exit_array_element().is_err());
        store.release_lock(&lock, false).unwrap();
        store.exit_array_element().unwrap();
        store.exit_array().unwrap();
    }
}
