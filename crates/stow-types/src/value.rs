use std::fmt;

use serde::{Deserialize, Serialize};

/// The primitive kinds a leaf can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafKind {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Byte,
    Char,
    /// A set of enumeration members, persisted by member name.
    Flags,
    StringArray,
}

impl LeafKind {
    /// Every leaf kind, in declaration order.
    pub const ALL: [LeafKind; 10] = [
        Self::String,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Boolean,
        Self::Byte,
        Self::Char,
        Self::Flags,
        Self::StringArray,
    ];

    /// Short name used in listings and type tags.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "i32",
            Self::Long => "i64",
            Self::Float => "f32",
            Self::Double => "f64",
            Self::Boolean => "bool",
            Self::Byte => "u8",
            Self::Char => "char",
            Self::Flags => "flags",
            Self::StringArray => "string-array",
        }
    }

    /// Inverse of [`LeafKind::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Phrase used in type-mismatch messages ("a string", "an i32").
    pub fn description(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Int => "an i32",
            Self::Long => "an i64",
            Self::Float => "an f32",
            Self::Double => "an f64",
            Self::Boolean => "a bool",
            Self::Byte => "a u8",
            Self::Char => "a char",
            Self::Flags => "a flag set",
            Self::StringArray => "a string array",
        }
    }

    /// Scalars are the kinds that have a single-token text form.
    pub fn is_scalar(self) -> bool {
        !matches!(self, Self::StringArray)
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed primitive owned by exactly one complex node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LeafValue {
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Byte(u8),
    Char(char),
    /// Member names of a flag set.
    Flags(Vec<String>),
    StringArray(Vec<String>),
}

impl LeafValue {
    pub fn kind(&self) -> LeafKind {
        match self {
            Self::String(_) => LeafKind::String,
            Self::Int(_) => LeafKind::Int,
            Self::Long(_) => LeafKind::Long,
            Self::Float(_) => LeafKind::Float,
            Self::Double(_) => LeafKind::Double,
            Self::Boolean(_) => LeafKind::Boolean,
            Self::Byte(_) => LeafKind::Byte,
            Self::Char(_) => LeafKind::Char,
            Self::Flags(_) => LeafKind::Flags,
            Self::StringArray(_) => LeafKind::StringArray,
        }
    }

    /// Canonical text form of a scalar leaf.
    ///
    /// Booleans render as the literal tokens `true`/`false`; flag sets as a
    /// space-joined member list. String arrays have no single-token form and
    /// return `None`.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Self::String(s) => s.clone(),
            Self::Int(v) => v.to_string(),
            Self::Long(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Boolean(v) => if *v { "true" } else { "false" }.to_string(),
            Self::Byte(v) => v.to_string(),
            Self::Char(c) => c.to_string(),
            Self::Flags(names) => join_flags(names),
            Self::StringArray(_) => return None,
        };
        Some(text)
    }

    /// Parse the canonical text form back into a leaf of `kind`.
    ///
    /// Returns `None` when the text is not a valid rendering of that kind.
    pub fn parse_text(kind: LeafKind, text: &str) -> Option<Self> {
        let value = match kind {
            LeafKind::String => Self::String(text.to_string()),
            LeafKind::Int => Self::Int(text.trim().parse().ok()?),
            LeafKind::Long => Self::Long(text.trim().parse().ok()?),
            LeafKind::Float => Self::Float(text.trim().parse().ok()?),
            LeafKind::Double => Self::Double(text.trim().parse().ok()?),
            LeafKind::Boolean => match text {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return None,
            },
            LeafKind::Byte => Self::Byte(text.trim().parse().ok()?),
            LeafKind::Char => {
                let mut chars = text.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Self::Char(c)
            }
            LeafKind::Flags => Self::Flags(split_flags(text)),
            LeafKind::StringArray => return None,
        };
        Some(value)
    }
}

macro_rules! leaf_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for LeafValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

leaf_from! {
    String => String,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    u8 => Byte,
    char => Char,
    Vec<String> => StringArray,
}

impl From<&str> for LeafValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A field-less enumeration whose sets are persisted by member name.
///
/// ```
/// use stow_types::FlagSet;
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// enum Perm { Read, Write }
///
/// impl FlagSet for Perm {
///     const MEMBERS: &'static [Self] = &[Perm::Read, Perm::Write];
///     fn member_name(&self) -> &'static str {
///         match self { Perm::Read => "READ", Perm::Write => "WRITE" }
///     }
/// }
///
/// assert_eq!(Perm::from_member_name("WRITE"), Some(Perm::Write));
/// assert_eq!(Perm::from_member_name("EXEC"), None);
/// ```
pub trait FlagSet: Sized + Copy + Eq + 'static {
    /// All members, in their canonical order.
    const MEMBERS: &'static [Self];

    fn member_name(&self) -> &'static str;

    fn from_member_name(name: &str) -> Option<Self> {
        Self::MEMBERS
            .iter()
            .copied()
            .find(|member| member.member_name() == name)
    }

    /// Position of this member in [`FlagSet::MEMBERS`].
    fn ordinal(&self) -> usize {
        Self::MEMBERS
            .iter()
            .position(|member| member == self)
            .unwrap_or(usize::MAX)
    }
}

/// Join member names into the persisted space-separated form.
pub fn join_flags<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split the persisted form back into member names. Empty input is the empty set.
pub fn split_flags(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}


#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    fn text_roundtrip(value: LeafValue) -> Option<LeafValue> {
        LeafValue::parse_text(value.kind(), &value.to_text()?)
    }

    proptest! {
        #[test]
        fn integers_survive_text(a in any::<i32>(), b in any::<i64>(), c in any::<u8>()) {
            for value in [LeafValue::Int(a), LeafValue::Long(b), LeafValue::Byte(c)] {
                prop_assert_eq!(text_roundtrip(value.clone()), Some(value));
            }
        }

        #[test]
        fn finite_doubles_survive_text(v in -1.0e300f64..1.0e300) {
            prop_assert_eq!(text_roundtrip(LeafValue::Double(v)), Some(LeafValue::Double(v)));
        }

        #[test]
        fn chars_survive_text(c in any::<char>()) {
            prop_assert_eq!(text_roundtrip(LeafValue::Char(c)), Some(LeafValue::Char(c)));
        }
    }
}
