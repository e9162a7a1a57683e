use std::fmt;

use stow_cursor::Cursor;
use stow_types::{LeafKind, StoreResult};

use crate::marshal::{Marshal, Marshaller};

/// How a field is laid out inside its owning complex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// A single leaf of this kind.
    Leaf(LeafKind),
    /// A string array for string elements, otherwise an array of
    /// self-described elements.
    List,
    /// An array of elements each holding a `key` and a `value` complex.
    Map,
    /// A nested complex holding a self-described value.
    Object,
}

type WriteFn<T> = Box<dyn Fn(&T, &Marshaller, &mut dyn Cursor) -> StoreResult<()>>;
type ReadFn<T> = Box<dyn Fn(&mut T, &Marshaller, &mut dyn Cursor) -> bool>;

/// One persisted field of a [`Persist`] type.
pub struct FieldDescriptor<T> {
    name: &'static str,
    layout: Layout,
    write: WriteFn<T>,
    read: ReadFn<T>,
}

impl<T: 'static> FieldDescriptor<T> {
    /// A field persisted as its own type.
    ///
    /// ```
    /// use stow_marshal::{FieldDescriptor, Layout};
    ///
    /// #[derive(Default)]
    /// struct Point { x: i32 }
    ///
    /// let field = FieldDescriptor::new("x", |p: &Point| &p.x, |p, v| p.x = v);
    /// assert_eq!(field.name(), "x");
    /// assert_eq!(field.layout(), Layout::Leaf(stow_types::LeafKind::Int));
    /// ```
    pub fn new<F: Marshal + 'static>(
        name: &'static str,
        get: fn(&T) -> &F,
        set: fn(&mut T, F),
    ) -> Self {
        Self {
            name,
            layout: F::layout(),
            write: Box::new(move |object: &T, m: &Marshaller, cursor: &mut dyn Cursor| {
                get(object).write_field(m, cursor, name)
            }),
            read: Self::reader(name, set),
        }
    }

    /// A field persisted as a projection of its value, typically the key of
    /// a lazily resolved reference. Nothing is written while the projection
    /// is `None`.
    pub fn persist_as<K: Marshal + 'static>(
        name: &'static str,
        project: fn(&T) -> Option<K>,
        set: fn(&mut T, K),
    ) -> Self {
        Self {
            name,
            layout: K::layout(),
            write: Box::new(move |object: &T, m: &Marshaller, cursor: &mut dyn Cursor| {
                match project(object) {
                    Some(key) => key.write_field(m, cursor, name),
                    None => Ok(()),
                }
            }),
            read: Self::reader(name, set),
        }
    }

    fn reader<F: Marshal + 'static>(name: &'static str, set: fn(&mut T, F)) -> ReadFn<T> {
        Box::new(move |object: &mut T, m: &Marshaller, cursor: &mut dyn Cursor| {
            match F::read_field(m, cursor, name) {
                Some(value) => {
                    set(object, value);
                    true
                }
                None => false,
            }
        })
    }
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn write_from(
        &self,
        object: &T,
        m: &Marshaller,
        cursor: &mut dyn Cursor,
    ) -> StoreResult<()> {
        (self.write)(object, m, cursor)
    }

    /// `false` when the entry is missing or mis-shaped; the field is left
    /// untouched.
    pub(crate) fn read_into(&self, object: &mut T, m: &Marshaller, cursor: &mut dyn Cursor) -> bool {
        (self.read)(object, m, cursor)
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish()
    }
}

/// A type the marshaller can write field by field and rebuild from its
/// [`Default`].
///
/// Overriding [`save_store_data`](Persist::save_store_data) and
/// [`load_store_data`](Persist::load_store_data) takes over persistence for
/// the type. Custom code can still call
/// [`Marshaller::write_fields`]/[`Marshaller::read_fields`] for the
/// descriptor-driven part.
pub trait Persist: Default + 'static {
    /// Type tag written into every complex holding this type.
    const TYPE_NAME: &'static str;

    fn descriptors() -> Vec<FieldDescriptor<Self>>;

    fn save_store_data(&self, marshaller: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
        marshaller.write_fields(self, cursor)
    }

    fn load_store_data(
        &mut self,
        marshaller: &Marshaller,
        cursor: &mut dyn Cursor,
    ) -> StoreResult<()> {
        marshaller.read_fields(self, cursor);
        Ok(())
    }
}
