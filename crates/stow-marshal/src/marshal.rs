use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use stow_cursor::{recover, Cursor, CursorExt};
use stow_types::{FlagSet, LeafKind, LeafValue, StoreResult};
use tracing::{debug, warn};

use crate::config::MarshalConfig;
use crate::descriptor::{FieldDescriptor, Layout, Persist};
use crate::registry::{TypeRegistry, LIST_TAG, MAP_TAG};

/// A value that knows how to lay itself out through a [`Cursor`].
///
/// Two forms exist. As a *field* the value sits under a name in its owner:
/// leaves are written directly, sequences as a string array or an array,
/// maps as an array of `key`/`value` pairs and everything else as a nested
/// complex. *Self-described* (`write_into`) the value fills the current
/// complex with a type tag and its payload, which is how array elements,
/// map keys and values, and top-level objects are stored.
pub trait Marshal: Sized {
    fn layout() -> Layout;

    /// Fill the current complex with a type tag and the payload.
    fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()>;

    /// Mirror of [`write_into`](Marshal::write_into). `None` when the current
    /// complex does not describe a `Self`.
    fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self>;

    /// The leaf form of a primitive.
    fn to_leaf(&self) -> Option<LeafValue> {
        None
    }

    fn from_leaf(_leaf: LeafValue) -> Option<Self> {
        None
    }

    fn write_field(&self, m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> StoreResult<()> {
        match self.to_leaf() {
            Some(leaf) => cursor.write_leaf(name, leaf),
            None => {
                cursor.create_complex(name)?;
                self.write_into(m, cursor)?;
                cursor.exit_complex()
            }
        }
    }

    fn read_field(m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> Option<Self> {
        if let Layout::Leaf(kind) = Self::layout() {
            return recover(cursor.read_leaf(name, kind), name).and_then(Self::from_leaf);
        }
        within_complex(cursor, name, |cursor| Self::read_from(m, cursor))
    }
}

/// Writes and reads object graphs through any backend.
///
/// Field descriptors are built once per type and cached for the lifetime of
/// the marshaller.
pub struct Marshaller {
    config: MarshalConfig,
    registry: TypeRegistry,
    descriptors: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl Default for Marshaller {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Marshaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marshaller")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cached_types", &self.descriptors.borrow().len())
            .finish()
    }
}

impl Marshaller {
    pub fn new() -> Self {
        Self::with_config(MarshalConfig::default())
    }

    pub fn with_config(config: MarshalConfig) -> Self {
        Self {
            config,
            registry: TypeRegistry::new(),
            descriptors: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Make `T` resolvable by [`read_object`](Marshaller::read_object).
    pub fn register<T: Persist>(&mut self) -> StoreResult<()> {
        self.registry.register::<T>()
    }

    // ---------------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------------

    /// Write `value` self-described into the current complex: a type tag,
    /// then either a `_value` leaf for primitives or the value's fields.
    pub fn write_object<T: Marshal>(&self, cursor: &mut dyn Cursor, value: &T) -> StoreResult<()> {
        value.write_into(self, cursor)
    }

    /// Read a value whose type the caller knows.
    pub fn read_as<T: Marshal>(&self, cursor: &mut dyn Cursor) -> Option<T> {
        T::read_from(self, cursor)
    }

    /// Read whatever the current complex describes.
    ///
    /// Object tags resolve through the registry. Primitives come back as
    /// their Rust type (`i32`, `String`, ...), flag sets and string arrays as
    /// `Vec<String>`, lists as `Vec<Box<dyn Any>>` and maps as
    /// `Vec<(Box<dyn Any>, Box<dyn Any>)>`.
    pub fn read_object(&self, cursor: &mut dyn Cursor) -> Option<Box<dyn Any>> {
        let tag = self.read_tag(cursor)?;
        if let Some(kind) = LeafKind::from_name(&tag) {
            let name = self.config.value_field.as_str();
            return recover(cursor.read_leaf(name, kind), name).map(boxed_leaf);
        }
        match tag.as_str() {
            LIST_TAG => {
                let name = self.config.items_field.as_str();
                let items: Vec<Box<dyn Any>> = match read_string_array(cursor, name) {
                    Some(strings) => strings
                        .into_iter()
                        .map(|s| Box::new(s) as Box<dyn Any>)
                        .collect(),
                    None => read_elements(cursor, name, |cursor| self.read_object(cursor))?,
                };
                Some(Box::new(items))
            }
            MAP_TAG => {
                let pairs = read_pairs(
                    self,
                    cursor,
                    &self.config.entries_field,
                    |cursor| self.read_object(cursor),
                    |cursor| self.read_object(cursor),
                )?;
                Some(Box::new(pairs))
            }
            _ => match self.registry.reader(&tag) {
                Some(read) => read(self, cursor),
                None => {
                    debug!(type_name = %tag, "no registered type for tag");
                    None
                }
            },
        }
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    /// Write every descriptor of `T` into the current complex.
    pub fn write_fields<T: Persist>(&self, value: &T, cursor: &mut dyn Cursor) -> StoreResult<()> {
        for field in self.descriptors::<T>().iter() {
            field.write_from(value, self, cursor)?;
        }
        Ok(())
    }

    /// Read every descriptor of `T` from the current complex. Returns how
    /// many fields were found; the others keep their current value.
    pub fn read_fields<T: Persist>(&self, value: &mut T, cursor: &mut dyn Cursor) -> usize {
        let mut found = 0;
        for field in self.descriptors::<T>().iter() {
            if field.read_into(value, self, cursor) {
                found += 1;
            } else {
                debug!(
                    type_name = T::TYPE_NAME,
                    field = field.name(),
                    "field missing or mis-shaped, keeping default"
                );
            }
        }
        found
    }

    /// The cached descriptors of `T`.
    pub fn descriptors<T: Persist>(&self) -> Rc<Vec<FieldDescriptor<T>>> {
        let id = TypeId::of::<T>();
        let cached = self.descriptors.borrow().get(&id).cloned();
        if let Some(fields) = cached.and_then(|any| any.downcast::<Vec<FieldDescriptor<T>>>().ok()) {
            return fields;
        }
        let fields: Vec<FieldDescriptor<T>> = T::descriptors()
            .into_iter()
            .filter(|field| {
                let reserved = self.config.is_reserved(field.name());
                if reserved {
                    warn!(
                        type_name = T::TYPE_NAME,
                        field = field.name(),
                        "field uses a reserved name and is not persisted"
                    );
                }
                !reserved
            })
            .collect();
        let fields = Rc::new(fields);
        self.descriptors.borrow_mut().insert(id, fields.clone());
        fields
    }

    fn write_persist<T: Persist>(&self, value: &T, cursor: &mut dyn Cursor) -> StoreResult<()> {
        self.write_tag(cursor, T::TYPE_NAME)?;
        value.save_store_data(self, cursor)
    }

    fn read_persist<T: Persist>(&self, cursor: &mut dyn Cursor) -> Option<T> {
        if !self.tag_is(cursor, T::TYPE_NAME) {
            return None;
        }
        let mut value = T::default();
        if let Err(err) = value.load_store_data(self, cursor) {
            warn!(type_name = T::TYPE_NAME, error = %err, "custom load failed, keeping partial object");
        }
        Some(value)
    }

    // ---------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------

    fn write_tag(&self, cursor: &mut dyn Cursor, tag: &str) -> StoreResult<()> {
        cursor.write_string(&self.config.type_field, tag)
    }

    fn read_tag(&self, cursor: &mut dyn Cursor) -> Option<String> {
        let name = self.config.type_field.as_str();
        recover(cursor.read_string(name), name)
    }

    fn tag_is(&self, cursor: &mut dyn Cursor, expected: &str) -> bool {
        match self.read_tag(cursor) {
            Some(tag) if tag == expected => true,
            found => {
                debug!(expected, ?found, "type tag mismatch");
                false
            }
        }
    }

    fn write_tagged_leaf(&self, leaf: LeafValue, cursor: &mut dyn Cursor) -> StoreResult<()> {
        self.write_tag(cursor, leaf.kind().name())?;
        cursor.write_leaf(&self.config.value_field, leaf)
    }

    fn read_tagged_leaf(&self, kind: LeafKind, cursor: &mut dyn Cursor) -> Option<LeafValue> {
        if !self.tag_is(cursor, kind.name()) {
            return None;
        }
        let name = self.config.value_field.as_str();
        recover(cursor.read_leaf(name, kind), name)
    }
}

fn boxed_leaf(leaf: LeafValue) -> Box<dyn Any> {
    match leaf {
        LeafValue::String(v) => Box::new(v),
        LeafValue::Int(v) => Box::new(v),
        LeafValue::Long(v) => Box::new(v),
        LeafValue::Float(v) => Box::new(v),
        LeafValue::Double(v) => Box::new(v),
        LeafValue::Boolean(v) => Box::new(v),
        LeafValue::Byte(v) => Box::new(v),
        LeafValue::Char(v) => Box::new(v),
        LeafValue::Flags(v) | LeafValue::StringArray(v) => Box::new(v),
    }
}

// -------------------------------------------------------------------
// Structural helpers
// -------------------------------------------------------------------

/// Run `read` inside the named complex and step back out.
fn within_complex<T>(
    cursor: &mut dyn Cursor,
    name: &str,
    read: impl FnOnce(&mut dyn Cursor) -> Option<T>,
) -> Option<T> {
    if !recover(cursor.try_enter_complex(name), name)? {
        return None;
    }
    let value = read(&mut *cursor);
    recover(cursor.exit_complex(), name)?;
    value
}

fn read_string_array(cursor: &mut dyn Cursor, name: &str) -> Option<Vec<String>> {
    match cursor.read_leaf(name, LeafKind::StringArray) {
        Ok(LeafValue::StringArray(items)) => Some(items),
        _ => None,
    }
}

/// Read each element of the named array. Unreadable elements are skipped.
fn read_elements<T>(
    cursor: &mut dyn Cursor,
    name: &str,
    mut read: impl FnMut(&mut dyn Cursor) -> Option<T>,
) -> Option<Vec<T>> {
    if !recover(cursor.try_enter_array(name), name)? {
        return None;
    }
    let len = recover(cursor.array_length(), name).unwrap_or(0);
    let mut items = Vec::with_capacity(len);
    for index in 0..len {
        recover(cursor.enter_array_element(index), name)?;
        if let Some(item) = read(&mut *cursor) {
            items.push(item);
        }
        recover(cursor.exit_array_element(), name)?;
    }
    recover(cursor.exit_array(), name)?;
    Some(items)
}

fn read_pairs<A, B>(
    m: &Marshaller,
    cursor: &mut dyn Cursor,
    name: &str,
    mut read_key: impl FnMut(&mut dyn Cursor) -> Option<A>,
    mut read_value: impl FnMut(&mut dyn Cursor) -> Option<B>,
) -> Option<Vec<(A, B)>> {
    let pairs = read_elements(cursor, name, |cursor| {
        let key = within_complex(&mut *cursor, &m.config.key_field, &mut read_key);
        let value = within_complex(&mut *cursor, &m.config.value_entry, &mut read_value);
        Some((key, value))
    })?;
    Some(
        pairs
            .into_iter()
            .filter_map(|(key, value)| Some((key?, value?)))
            .collect(),
    )
}

fn is_string_element<T: Marshal>() -> bool {
    T::layout() == Layout::Leaf(LeafKind::String)
}

fn write_seq<'a, T: Marshal + 'a>(
    items: impl Iterator<Item = &'a T>,
    m: &Marshaller,
    cursor: &mut dyn Cursor,
    name: &str,
) -> StoreResult<()> {
    let items: Vec<&T> = items.collect();
    if is_string_element::<T>() {
        // An absent item has no string form; the element array keeps its slot.
        let strings: Option<Vec<String>> = items
            .iter()
            .map(|item| match item.to_leaf() {
                Some(LeafValue::String(s)) => Some(s),
                _ => None,
            })
            .collect();
        if let Some(strings) = strings {
            return cursor.write_leaf(name, LeafValue::StringArray(strings));
        }
    }
    cursor.create_array(name)?;
    for item in items {
        cursor.create_array_element()?;
        item.write_into(m, cursor)?;
        cursor.exit_array_element()?;
    }
    cursor.exit_array()
}

fn read_seq<T: Marshal>(m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> Option<Vec<T>> {
    if is_string_element::<T>() {
        if let Some(strings) = read_string_array(cursor, name) {
            return strings
                .into_iter()
                .map(|s| T::from_leaf(LeafValue::String(s)))
                .collect();
        }
    }
    read_elements(cursor, name, |cursor| T::read_from(m, cursor))
}

fn write_map<'a, K: Marshal + 'a, V: Marshal + 'a>(
    pairs: impl Iterator<Item = (&'a K, &'a V)>,
    m: &Marshaller,
    cursor: &mut dyn Cursor,
    name: &str,
) -> StoreResult<()> {
    cursor.create_array(name)?;
    for (key, value) in pairs {
        cursor.create_array_element()?;
        cursor.create_complex(&m.config.key_field)?;
        key.write_into(m, cursor)?;
        cursor.exit_complex()?;
        cursor.create_complex(&m.config.value_entry)?;
        value.write_into(m, cursor)?;
        cursor.exit_complex()?;
        cursor.exit_array_element()?;
    }
    cursor.exit_array()
}

fn read_map<K: Marshal, V: Marshal>(
    m: &Marshaller,
    cursor: &mut dyn Cursor,
    name: &str,
) -> Option<Vec<(K, V)>> {
    read_pairs(
        m,
        cursor,
        name,
        |cursor| K::read_from(m, cursor),
        |cursor| V::read_from(m, cursor),
    )
}

// -------------------------------------------------------------------
// Implementations
// -------------------------------------------------------------------

macro_rules! leaf_marshal {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Marshal for $ty {
                fn layout() -> Layout {
                    Layout::Leaf(LeafKind::$variant)
                }

                fn to_leaf(&self) -> Option<LeafValue> {
                    Some(LeafValue::$variant(<$ty as Clone>::clone(self)))
                }

                fn from_leaf(leaf: LeafValue) -> Option<Self> {
                    match leaf {
                        LeafValue::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
                    m.write_tagged_leaf(LeafValue::$variant(<$ty as Clone>::clone(self)), cursor)
                }

                fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
                    m.read_tagged_leaf(LeafKind::$variant, cursor)
                        .and_then(Self::from_leaf)
                }
            }
        )*
    };
}

leaf_marshal! {
    String => String,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    u8 => Byte,
    char => Char,
}

/// A set of [`FlagSet`] members persisted as one flag-set leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flags<F>(pub Vec<F>);

impl<F> Default for Flags<F> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<F: FlagSet> Flags<F> {
    pub fn contains(&self, member: F) -> bool {
        self.0.contains(&member)
    }

    fn normalized(mut members: Vec<F>) -> Self {
        members.sort_by_key(|member| member.ordinal());
        members.dedup();
        Self(members)
    }
}

impl<F: FlagSet> Marshal for Flags<F> {
    fn layout() -> Layout {
        Layout::Leaf(LeafKind::Flags)
    }

    fn to_leaf(&self) -> Option<LeafValue> {
        let names = Self::normalized(self.0.clone())
            .0
            .iter()
            .map(|member| member.member_name().to_string())
            .collect();
        Some(LeafValue::Flags(names))
    }

    fn from_leaf(leaf: LeafValue) -> Option<Self> {
        let LeafValue::Flags(names) = leaf else {
            return None;
        };
        let members = names
            .iter()
            .map(|name| F::from_member_name(name))
            .collect::<Option<Vec<F>>>()?;
        Some(Self::normalized(members))
    }

    fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
        match self.to_leaf() {
            Some(leaf) => m.write_tagged_leaf(leaf, cursor),
            None => Ok(()),
        }
    }

    fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
        m.read_tagged_leaf(LeafKind::Flags, cursor)
            .and_then(Self::from_leaf)
    }
}

/// `None` is never written; reading a missing entry yields `Some(None)`.
impl<T: Marshal> Marshal for Option<T> {
    fn layout() -> Layout {
        T::layout()
    }

    fn to_leaf(&self) -> Option<LeafValue> {
        self.as_ref().and_then(T::to_leaf)
    }

    fn from_leaf(leaf: LeafValue) -> Option<Self> {
        T::from_leaf(leaf).map(Some)
    }

    fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
        match self {
            Some(value) => value.write_into(m, cursor),
            None => Ok(()),
        }
    }

    fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
        Some(T::read_from(m, cursor))
    }

    fn write_field(&self, m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> StoreResult<()> {
        match self {
            Some(value) => value.write_field(m, cursor, name),
            None => Ok(()),
        }
    }

    fn read_field(m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> Option<Self> {
        Some(T::read_field(m, cursor, name))
    }
}

macro_rules! seq_methods {
    () => {
        fn layout() -> Layout {
            Layout::List
        }

        fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
            m.write_tag(cursor, LIST_TAG)?;
            write_seq(self.iter(), m, cursor, &m.config.items_field)
        }

        fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
            if !m.tag_is(cursor, LIST_TAG) {
                return None;
            }
            Self::read_field(m, cursor, &m.config.items_field)
        }

        fn write_field(&self, m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> StoreResult<()> {
            write_seq(self.iter(), m, cursor, name)
        }

        fn read_field(m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> Option<Self> {
            read_seq::<T>(m, cursor, name).map(|items| items.into_iter().collect())
        }
    };
}

impl<T: Marshal> Marshal for Vec<T> {
    seq_methods!();
}

impl<T: Marshal> Marshal for VecDeque<T> {
    seq_methods!();
}

impl<T: Marshal + Eq + Hash> Marshal for HashSet<T> {
    seq_methods!();
}

impl<T: Marshal + Ord> Marshal for BTreeSet<T> {
    seq_methods!();
}

macro_rules! map_methods {
    () => {
        fn layout() -> Layout {
            Layout::Map
        }

        fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
            m.write_tag(cursor, MAP_TAG)?;
            write_map(self.iter(), m, cursor, &m.config.entries_field)
        }

        fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
            if !m.tag_is(cursor, MAP_TAG) {
                return None;
            }
            Self::read_field(m, cursor, &m.config.entries_field)
        }

        fn write_field(&self, m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> StoreResult<()> {
            write_map(self.iter(), m, cursor, name)
        }

        fn read_field(m: &Marshaller, cursor: &mut dyn Cursor, name: &str) -> Option<Self> {
            read_map::<K, V>(m, cursor, name).map(|pairs| pairs.into_iter().collect())
        }
    };
}

impl<K: Marshal + Eq + Hash, V: Marshal> Marshal for HashMap<K, V> {
    map_methods!();
}

impl<K: Marshal + Ord, V: Marshal> Marshal for BTreeMap<K, V> {
    map_methods!();
}

impl<T: Persist> Marshal for T {
    fn layout() -> Layout {
        Layout::Object
    }

    fn write_into(&self, m: &Marshaller, cursor: &mut dyn Cursor) -> StoreResult<()> {
        m.write_persist(self, cursor)
    }

    fn read_from(m: &Marshaller, cursor: &mut dyn Cursor) -> Option<Self> {
        m.read_persist(cursor)
    }
}
