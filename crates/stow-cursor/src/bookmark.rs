//! Saved cursor positions and traversal locks.
//!
//! A [`Bookmark`] captures the node under the cursor together with the
//! session that produced it. A lock is a bookmark registered in the
//! session's [`LockRegistry`]; while it is live, the cursor may descend
//! freely below its origin but may not ascend past it.
//!
//! Whether a move from the current node to some target crosses a lock is
//! decided from the two root-to-node paths: the nodes of the current path
//! below the lowest common ancestor are exactly the nodes the move would
//! leave, and none of them may be the origin of a live lock.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use stow_types::{LockId, SessionId, StoreError, StoreResult};
use tracing::debug;

use crate::traits::Cursor;

/// A saved cursor position, valid only in the session that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bookmark<N> {
    session: SessionId,
    node: N,
}

impl<N: Copy> Bookmark<N> {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The node this bookmark refers to.
    pub fn node(&self) -> N {
        self.node
    }
}

/// Handle returned by [`Bookmarks::acquire_lock`].
///
/// Deliberately not `Clone`: a lock has exactly one owner, who passes the
/// handle back to [`Bookmarks::release_lock`].
#[derive(Debug, PartialEq, Eq)]
pub struct LockHandle<N> {
    id: LockId,
    origin: Bookmark<N>,
}

impl<N: Copy> LockHandle<N> {
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Where the lock was acquired.
    pub fn origin(&self) -> Bookmark<N> {
        self.origin
    }
}

/// Live locks of one session, keyed by id.
#[derive(Clone, Debug)]
pub struct LockRegistry<N> {
    locks: HashMap<LockId, N>,
}

impl<N> Default for LockRegistry<N> {
    fn default() -> Self {
        Self {
            locks: HashMap::new(),
        }
    }
}

impl<N: Copy + Eq> LockRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lock at `node` under a fresh id.
    pub fn register(&mut self, node: N) -> LockId {
        let id = LockId::generate();
        self.locks.insert(id, node);
        id
    }

    pub fn remove(&mut self, id: LockId) -> Option<N> {
        self.locks.remove(&id)
    }

    pub fn contains(&self, id: LockId) -> bool {
        self.locks.contains_key(&id)
    }

    pub fn origin(&self, id: LockId) -> Option<N> {
        self.locks.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// A live lock whose origin is `node`, other than `exclude`.
    pub fn lock_at(&self, node: N, exclude: Option<LockId>) -> Option<LockId> {
        self.locks
            .iter()
            .find(|(id, origin)| **origin == node && Some(**id) != exclude)
            .map(|(id, _)| *id)
    }

    /// The first lock found at any of `leaving`, other than `exclude`.
    pub fn crossing(&self, leaving: &[N], exclude: Option<LockId>) -> Option<LockId> {
        leaving
            .iter()
            .rev()
            .find_map(|node| self.lock_at(*node, exclude))
    }

    /// Fail if ascending out of `node` would cross a live lock.
    ///
    /// Backends call this from every exit operation.
    pub fn guard_exit(&self, node: N) -> StoreResult<()> {
        match self.lock_at(node, None) {
            Some(lock) => Err(StoreError::DataLock { lock }),
            None => Ok(()),
        }
    }
}

/// Root-first path from `root` down to `node`, following `parent` links.
///
/// Fails with [`StoreError::StaleBookmark`] if the walk ends anywhere other
/// than `root`, i.e. `node` has been detached.
pub fn ancestor_path<N, F>(node: N, root: N, parent: F) -> StoreResult<Vec<N>>
where
    N: Copy + Eq,
    F: Fn(N) -> Option<N>,
{
    let mut path = vec![node];
    let mut current = node;
    while let Some(up) = parent(current) {
        path.push(up);
        current = up;
    }
    if current != root {
        return Err(StoreError::StaleBookmark);
    }
    path.reverse();
    Ok(path)
}

/// Index of the first position where two root-first paths differ.
///
/// If one path is a prefix of the other this is the length of the shorter
/// one. The lowest common ancestor sits at the returned index minus one.
pub fn divergence_index<N: Eq>(a: &[N], b: &[N]) -> usize {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Saved positions and traversal locks for a backend session.
///
/// Backends expose their node handles and parent links; the provided
/// methods implement bookmark validation and lock enforcement once for all
/// of them.
pub trait Bookmarks: Cursor {
    /// Backend node handle.
    type Node: Copy + Eq + Hash + Debug;

    fn session_id(&self) -> SessionId;

    fn root_node(&self) -> Self::Node;

    fn current_node(&self) -> Self::Node;

    /// Parent of `node`, or `None` for the root and for detached nodes.
    fn parent_node(&self, node: Self::Node) -> Option<Self::Node>;

    /// Point the cursor at `node` without any checks.
    fn move_to(&mut self, node: Self::Node);

    fn locks(&self) -> &LockRegistry<Self::Node>;

    fn locks_mut(&mut self) -> &mut LockRegistry<Self::Node>;

    /// Root-first path to `node` in this session's tree.
    fn path_to(&self, node: Self::Node) -> StoreResult<Vec<Self::Node>> {
        ancestor_path(node, self.root_node(), |n| self.parent_node(n))
    }

    fn create_bookmark(&self) -> Bookmark<Self::Node> {
        Bookmark {
            session: self.session_id(),
            node: self.current_node(),
        }
    }

    /// Move the cursor back to a bookmarked position.
    ///
    /// The move is rejected if it would leave the subtree of a live lock.
    fn restore(&mut self, bookmark: &Bookmark<Self::Node>) -> StoreResult<()> {
        if bookmark.session != self.session_id() {
            return Err(StoreError::MismatchedBookmark);
        }
        let target = self.path_to(bookmark.node)?;
        let current = self.path_to(self.current_node())?;
        let split = divergence_index(&current, &target);
        if let Some(lock) = self.locks().crossing(&current[split..], None) {
            return Err(StoreError::DataLock { lock });
        }
        self.move_to(bookmark.node);
        Ok(())
    }

    /// Pin the current node. Until released, exits out of it fail.
    fn acquire_lock(&mut self) -> LockHandle<Self::Node> {
        let origin = self.create_bookmark();
        let id = self.locks_mut().register(origin.node);
        debug!(lock = %id, node = ?origin.node, "acquired traversal lock");
        LockHandle { id, origin }
    }

    /// Release a lock, optionally returning the cursor to its origin.
    ///
    /// Fails with [`StoreError::DataLock`] while the cursor sits below
    /// another live lock that was acquired beneath this one; in that case
    /// nothing changes.
    fn release_lock(
        &mut self,
        handle: &LockHandle<Self::Node>,
        return_to_origin: bool,
    ) -> StoreResult<()> {
        if handle.origin.session != self.session_id() {
            return Err(StoreError::MismatchedBookmark);
        }
        if !self.locks().contains(handle.id) {
            return Err(StoreError::UnknownLock(handle.id));
        }
        let origin = self.path_to(handle.origin.node)?;
        let current = self.path_to(self.current_node())?;
        let split = divergence_index(&current, &origin);
        if let Some(lock) = self.locks().crossing(&current[split..], Some(handle.id)) {
            return Err(StoreError::DataLock { lock });
        }
        self.locks_mut().remove(handle.id);
        debug!(lock = %handle.id, "released traversal lock");
        if return_to_origin {
            self.move_to(handle.origin.node);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tree used below:
    //
    //        0
    //      /   \
    //     1     2
    //    / \     \
    //   3   4     5
    //   |
    //   6
    fn parent(n: u32) -> Option<u32> {
        match n {
            1 | 2 => Some(0),
            3 | 4 => Some(1),
            5 => Some(2),
            6 => Some(3),
            _ => None,
        }
    }

    fn path(n: u32) -> Vec<u32> {
        ancestor_path(n, 0, parent).unwrap()
    }

    // ---------------------------------------------------------------
    // Paths
    // ---------------------------------------------------------------

    #[test]
    fn path_is_root_first() {
        assert_eq!(path(6), vec![0, 1, 3, 6]);
        assert_eq!(path(0), vec![0]);
    }

    #[test]
    fn detached_node_is_stale() {
        // 9 has no parent and is not the root.
        assert!(matches!(
            ancestor_path(9, 0, parent),
            Err(StoreError::StaleBookmark)
        ));
    }

    #[test]
    fn divergence_on_branches() {
        // LCA of 6 and 4 is 1, at index 1.
        assert_eq!(divergence_index(&path(6), &path(4)), 2);
        // LCA of 6 and 5 is the root.
        assert_eq!(divergence_index(&path(6), &path(5)), 1);
    }

    #[test]
    fn divergence_when_one_is_ancestor() {
        // Target is a strict ancestor of current: no divergence before the
        // shorter path runs out.
        assert_eq!(divergence_index(&path(6), &path(1)), 2);
        assert_eq!(divergence_index(&path(1), &path(6)), 2);
        assert_eq!(divergence_index(&path(3), &path(3)), 3);
    }

    // ---------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------

    #[test]
    fn registry_register_and_remove() {
        let mut locks = LockRegistry::new();
        let id = locks.register(3u32);
        assert!(locks.contains(id));
        assert_eq!(locks.origin(id), Some(3));
        assert_eq!(locks.len(), 1);
        assert_eq!(locks.remove(id), Some(3));
        assert!(locks.is_empty());
        assert_eq!(locks.remove(id), None);
    }

    #[test]
    fn crossing_ignores_lca_and_excluded_lock() {
        let mut locks = LockRegistry::new();
        let outer = locks.register(1u32);
        let current = path(6);
        let target = path(1);
        let split = divergence_index(&current, &target);
        // Leaving 3 and 6 only; the lock at 1 is the common ancestor.
        assert_eq!(&current[split..], &[3, 6]);
        assert_eq!(locks.crossing(&current[split..], None), None);

        let inner = locks.register(3u32);
        assert_eq!(locks.crossing(&current[split..], Some(outer)), Some(inner));
        assert_eq!(locks.crossing(&current[split..], Some(inner)), None);
    }

    #[test]
    fn guard_exit_only_trips_on_origin() {
        let mut locks = LockRegistry::new();
        let id = locks.register(3u32);
        assert!(locks.guard_exit(6).is_ok());
        assert!(matches!(
            locks.guard_exit(3),
            Err(StoreError::DataLock { lock }) if lock == id
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn divergence_never_exceeds_shorter_path(a in 0u32..7, b in 0u32..7) {
                let pa = path(a);
                let pb = path(b);
                let k = divergence_index(&pa, &pb);
                prop_assert!(k >= 1);
                prop_assert!(k <= pa.len().min(pb.len()));
                prop_assert_eq!(&pa[..k], &pb[..k]);
            }
        }
    }
}
