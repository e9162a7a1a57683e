use std::cell::OnceCell;
use std::fmt;

use stow_cursor::Cursor;
use stow_types::{LeafValue, StoreResult};

use crate::descriptor::Layout;
use crate::marshal::{Marshal, Marshaller};

/// Looks up the value behind a key.
pub trait Resolve<K, V> {
    fn resolve(&self, key: &K) -> Option<V>;
}

impl<K, V, F: Fn(&K) -> Option<V>> Resolve<K, V> for F {
    fn resolve(&self, key: &K) -> Option<V> {
        self(key)
    }
}

/// A reference persisted by key whose value is resolved on first use.
///
/// Only the key is marshalled; an empty reference writes nothing. Equality
/// compares keys.
pub struct Cached<K, V> {
    key: Option<K>,
    value: OnceCell<Option<Box<V>>>,
}

impl<K, V> Cached<K, V> {
    pub fn new(key: K) -> Self {
        Self {
            key: Some(key),
            value: OnceCell::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            key: None,
            value: OnceCell::new(),
        }
    }

    /// A reference whose value is already known.
    pub fn resolved(key: K, value: V) -> Self {
        Self {
            key: Some(key),
            value: OnceCell::from(Some(Box::new(value))),
        }
    }

    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// The referenced value, resolving it on first call. A failed lookup is
    /// remembered until the key changes.
    pub fn get<R: Resolve<K, V> + ?Sized>(&self, resolver: &R) -> Option<&V> {
        self.value
            .get_or_init(|| {
                self.key
                    .as_ref()
                    .and_then(|key| resolver.resolve(key))
                    .map(Box::new)
            })
            .as_deref()
    }

    /// Point at another key and forget the resolved value.
    pub fn set_key(&mut self, key: Option<K>) {
        self.key = key;
        self.value = OnceCell::new();
    }
}

impl<K, V> Default for Cached<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: Clone, V: Clone> Clone for Cached<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

impl<K: PartialEq, V> PartialEq for Cached<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Cached<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cached")
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<K: Marshal, V> Marshal for Cached<K, V> {
    fn layout() -> Layout {
        K::layout()
    }

    fn to_leaf(&self) -> Option<LeafValue> {
        self.key.as_ref().and_then(K::to_leaf)
    }

    fn from_leaf(leaf: LeafValue) -> Option<Self> {
        K::from_leaf(leaf).map(Self::new)
    }

    fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
        match &self.key {
            Some(key) => key.write_into(m, cursor),
            None => Ok(()),
        }
    }

    fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
        K::read_from(m, cursor).map(Self::new)
    }

    fn write_field(&self, m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> StoreResult<()> {
        match &self.key {
            Some(key) => key.write_field(m, cursor, name),
            None => Ok(()),
        }
    }

    fn read_field(m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> Option<Self> {
        K::read_field(m, cursor, name).map(Self::new)
    }
}
