use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use stow_cursor::Cursor;
use stow_types::{LeafKind, StoreError, StoreResult};
use tracing::debug;

use crate::descriptor::Persist;
use crate::marshal::Marshaller;

/// Type tag of a self-described sequence.
pub(crate) const LIST_TAG: &str = "list";
/// Type tag of a self-described map.
pub(crate) const MAP_TAG: &str = "map";

type ReadErased = fn(&Marshaller, &mut dyn Cursor) -> Option<Box<dyn Any>>;

/// Maps type tags to constructible [`Persist`] types.
///
/// Registering a name twice replaces the earlier type.
#[derive(Default)]
pub struct TypeRegistry {
    readers: HashMap<String, ReadErased>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under [`Persist::TYPE_NAME`].
    ///
    /// Fails with [`StoreError::ReservedName`] for names the marshaller uses
    /// for primitives and collections.
    pub fn register<T: Persist>(&mut self) -> StoreResult<()> {
        let name = T::TYPE_NAME;
        if name.is_empty() {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
                reason: "type name must not be empty".into(),
            });
        }
        if is_reserved_tag(name) {
            return Err(StoreError::ReservedName(name.to_string()));
        }
        self.readers.insert(name.to_string(), read_erased::<T>);
        debug!(type_name = name, "registered type");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.readers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn reader(&self, name: &str) -> Option<ReadErased> {
        self.readers.get(name).copied()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.type_names()).finish()
    }
}

fn read_erased<T: Persist>(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Box<dyn Any>> {
    m.read_as::<T>(cursor).map(|value| Box::new(value) as Box<dyn Any>)
}

fn is_reserved_tag(name: &str) -> bool {
    name == LIST_TAG || name == MAP_TAG || LeafKind::from_name(name).is_some()
}
