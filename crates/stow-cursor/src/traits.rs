use stow_types::{
    Context, EntryInfo, FlagSet, LeafKind, LeafValue, StoreError, StoreResult,
};
use tracing::warn;

/// The traversal contract every backend implements.
///
/// A cursor references exactly one node at a time. Its [`Context`] decides
/// which operations are legal:
///
/// | operation                                   | valid in                 |
/// |---------------------------------------------|--------------------------|
/// | `enter_*`/`create_*` by name, leaf I/O, `entries` | Complex, ArrayElement |
/// | `exit_complex`                              | Complex (not the root)   |
/// | `exit_array`, `enter_array_element`, `create_array_element`, `array_length` | Array |
/// | `exit_array_element`                        | ArrayElement             |
///
/// Anything else fails fast with [`StoreError::WrongContext`]. Lookups by name
/// fail with the data-shape errors [`StoreError::EntryNotFound`] and
/// [`StoreError::IncompatibleType`].
///
/// The trait is object-safe; the marshaller and tree copy work on
/// `&mut dyn Cursor`.
pub trait Cursor {
    /// The context of the node the cursor currently references.
    fn context(&self) -> Context;

    /// Move into the named child complex.
    fn enter_complex(&mut self, name: &str) -> StoreResult<()>;

    /// Move into the named child array.
    fn enter_array(&mut self, name: &str) -> StoreResult<()>;

    /// Move into element `index` of the current array.
    fn enter_array_element(&mut self, index: usize) -> StoreResult<()>;

    /// Return from a complex to its parent complex.
    fn exit_complex(&mut self) -> StoreResult<()>;

    /// Return from an array to the complex holding it.
    fn exit_array(&mut self) -> StoreResult<()>;

    /// Return from an array element to its array.
    fn exit_array_element(&mut self) -> StoreResult<()>;

    /// Number of elements in the current array.
    fn array_length(&self) -> StoreResult<usize>;

    /// Create a complex under `name` and enter it.
    ///
    /// Any existing entry of that name is replaced.
    fn create_complex(&mut self, name: &str) -> StoreResult<()>;

    /// Create an array under `name` and enter it.
    ///
    /// Any existing entry of that name is replaced.
    fn create_array(&mut self, name: &str) -> StoreResult<()>;

    /// Append an element to the current array and enter it.
    fn create_array_element(&mut self) -> StoreResult<()>;

    /// Read the leaf `name` as `kind`.
    fn read_leaf(&self, name: &str, kind: LeafKind) -> StoreResult<LeafValue>;

    /// Write a leaf, replacing any existing entry of the same name.
    fn write_leaf(&mut self, name: &str, value: LeafValue) -> StoreResult<()>;

    /// Named entries of the current complex, in document order.
    fn entries(&self) -> StoreResult<Vec<EntryInfo>>;
}

/// Turn a failed lookup into `None`, logging anything that is not a
/// data-shape error.
pub fn recover<T>(result: StoreResult<T>, name: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) if err.is_data_shape() => None,
        Err(err) => {
            warn!(name, error = %err, "read with default swallowed a traversal error");
            None
        }
    }
}

macro_rules! scalar_accessors {
    ($($read:ident, $read_or:ident, $write:ident: $ty:ty => $variant:ident;)*) => {
        $(
            fn $read(&self, name: &str) -> StoreResult<$ty> {
                match self.read_leaf(name, LeafKind::$variant)? {
                    LeafValue::$variant(value) => Ok(value),
                    _ => Err(StoreError::incompatible(name, LeafKind::$variant.description())),
                }
            }

            fn $read_or(&self, name: &str, default: $ty) -> $ty {
                recover(self.$read(name), name).unwrap_or(default)
            }

            fn $write(&mut self, name: &str, value: $ty) -> StoreResult<()> {
                self.write_leaf(name, LeafValue::$variant(value))
            }
        )*
    };
}

/// Typed convenience layer over [`Cursor`].
///
/// Implemented for every cursor, including `dyn Cursor`.
pub trait CursorExt: Cursor {
    scalar_accessors! {
        read_int, read_int_or, write_int: i32 => Int;
        read_long, read_long_or, write_long: i64 => Long;
        read_float, read_float_or, write_float: f32 => Float;
        read_double, read_double_or, write_double: f64 => Double;
        read_bool, read_bool_or, write_bool: bool => Boolean;
        read_byte, read_byte_or, write_byte: u8 => Byte;
        read_char, read_char_or, write_char: char => Char;
    }

    fn read_string(&self, name: &str) -> StoreResult<String> {
        match self.read_leaf(name, LeafKind::String)? {
            LeafValue::String(value) => Ok(value),
            _ => Err(StoreError::incompatible(name, LeafKind::String.description())),
        }
    }

    fn read_string_or(&self, name: &str, default: &str) -> String {
        recover(self.read_string(name), name).unwrap_or_else(|| default.to_string())
    }

    fn write_string(&mut self, name: &str, value: &str) -> StoreResult<()> {
        self.write_leaf(name, LeafValue::String(value.to_string()))
    }

    fn read_string_array(&self, name: &str) -> StoreResult<Vec<String>> {
        match self.read_leaf(name, LeafKind::StringArray)? {
            LeafValue::StringArray(values) => Ok(values),
            _ => Err(StoreError::incompatible(name, LeafKind::StringArray.description())),
        }
    }

    fn read_string_array_or(&self, name: &str, default: &[String]) -> Vec<String> {
        recover(self.read_string_array(name), name).unwrap_or_else(|| default.to_vec())
    }

    fn write_string_array<S: AsRef<str>>(&mut self, name: &str, values: &[S]) -> StoreResult<()> {
        let values = values.iter().map(|s| s.as_ref().to_string()).collect();
        self.write_leaf(name, LeafValue::StringArray(values))
    }

    /// Read a flag set. Members come back in [`FlagSet::MEMBERS`] order.
    ///
    /// An unknown member name makes the whole entry incompatible.
    fn read_flags<F: FlagSet>(&self, name: &str) -> StoreResult<Vec<F>> {
        let names = match self.read_leaf(name, LeafKind::Flags)? {
            LeafValue::Flags(names) => names,
            _ => return Err(StoreError::incompatible(name, LeafKind::Flags.description())),
        };
        let mut members = names
            .iter()
            .map(|member| F::from_member_name(member))
            .collect::<Option<Vec<F>>>()
            .ok_or_else(|| StoreError::incompatible(name, LeafKind::Flags.description()))?;
        members.sort_by_key(|member| member.ordinal());
        members.dedup();
        Ok(members)
    }

    fn read_flags_or<F: FlagSet>(&self, name: &str, default: &[F]) -> Vec<F> {
        recover(self.read_flags(name), name).unwrap_or_else(|| default.to_vec())
    }

    fn write_flags<F: FlagSet>(&mut self, name: &str, members: &[F]) -> StoreResult<()> {
        let mut members = members.to_vec();
        members.sort_by_key(|member| member.ordinal());
        members.dedup();
        let names = members
            .iter()
            .map(|member| member.member_name().to_string())
            .collect();
        self.write_leaf(name, LeafValue::Flags(names))
    }

    /// Enter the named complex if it exists; `Ok(false)` if it is absent or
    /// not a complex.
    fn try_enter_complex(&mut self, name: &str) -> StoreResult<bool> {
        match self.enter_complex(name) {
            Ok(()) => Ok(true),
            Err(err) if err.is_data_shape() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Enter the named array if it exists; `Ok(false)` if it is absent or
    /// not an array.
    fn try_enter_array(&mut self, name: &str) -> StoreResult<bool> {
        match self.enter_array(name) {
            Ok(()) => Ok(true),
            Err(err) if err.is_data_shape() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<C: Cursor + ?Sized> CursorExt for C {}
