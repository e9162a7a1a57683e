use stow_types::LeafValue;

/// Largest name or short-string payload, in bytes.
pub const MAX_SHORT: usize = u16::MAX as usize;

/// Largest long-string payload, string-array entry, or string-array count.
pub const MAX_LONG: usize = u32::MAX as usize;

/// One-byte entry tag of the binary stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// String with a u16 length.
    String,
    /// String with a u32 length, for values past [`MAX_SHORT`] bytes.
    LongString,
    Int,
    Long,
    Float,
    Double,
    True,
    False,
    Byte,
    /// Unicode scalar value as a u32.
    Char,
    /// Space-joined member names with a u16 length.
    Flags,
    /// u32 count, then u32-length-prefixed entries.
    StringArray,
    /// Named complex, or an unnamed element inside an array.
    Complex,
    Array,
    /// Closes the innermost open complex or array.
    End,
}

impl Tag {
    /// Serialize to the tag byte.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::String => b's',
            Self::LongString => b'S',
            Self::Int => b'i',
            Self::Long => b'l',
            Self::Float => b'f',
            Self::Double => b'd',
            Self::True => b'y',
            Self::False => b'n',
            Self::Byte => b'b',
            Self::Char => b'c',
            Self::Flags => b'e',
            Self::StringArray => b'r',
            Self::Complex => b'o',
            Self::Array => b'a',
            Self::End => b'z',
        }
    }

    /// Parse a tag byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        let tag = match byte {
            b's' => Self::String,
            b'S' => Self::LongString,
            b'i' => Self::Int,
            b'l' => Self::Long,
            b'f' => Self::Float,
            b'd' => Self::Double,
            b'y' => Self::True,
            b'n' => Self::False,
            b'b' => Self::Byte,
            b'c' => Self::Char,
            b'e' => Self::Flags,
            b'r' => Self::StringArray,
            b'o' => Self::Complex,
            b'a' => Self::Array,
            b'z' => Self::End,
            _ => return None,
        };
        Some(tag)
    }

    /// The tag a leaf is written under.
    pub fn for_leaf(value: &LeafValue) -> Self {
        match value {
            LeafValue::String(s) if s.len() > MAX_SHORT => Self::LongString,
            LeafValue::String(_) => Self::String,
            LeafValue::Int(_) => Self::Int,
            LeafValue::Long(_) => Self::Long,
            LeafValue::Float(_) => Self::Float,
            LeafValue::Double(_) => Self::Double,
            LeafValue::Boolean(true) => Self::True,
            LeafValue::Boolean(false) => Self::False,
            LeafValue::Byte(_) => Self::Byte,
            LeafValue::Char(_) => Self::Char,
            LeafValue::Flags(_) => Self::Flags,
            LeafValue::StringArray(_) => Self::StringArray,
        }
    }

    /// Whether the tag introduces a leaf rather than a container marker.
    pub fn is_leaf(self) -> bool {
        !matches!(self, Self::Complex | Self::Array | Self::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Tag; 15] = [
        Tag::String,
        Tag::LongString,
        Tag::Int,
        Tag::Long,
        Tag::Float,
        Tag::Double,
        Tag::True,
        Tag::False,
        Tag::Byte,
        Tag::Char,
        Tag::Flags,
        Tag::StringArray,
        Tag::Complex,
        Tag::Array,
        Tag::End,
    ];

    #[test]
    fn type_byte_roundtrip() {
        for tag in ALL {
            assert_eq!(Tag::from_type_byte(tag.type_byte()), Some(tag));
        }
    }

    #[test]
    fn type_bytes_are_ascii_and_distinct() {
        let mut bytes: Vec<u8> = ALL.iter().map(|t| t.type_byte()).collect();
        assert!(bytes.iter().all(u8::is_ascii_alphabetic));
        bytes.sort_unstable();
        bytes.dedup();
        assert_eq!(bytes.len(), ALL.len());
    }

    #[test]
    fn from_type_byte_unknown() {
        assert!(Tag::from_type_byte(0).is_none());
        assert!(Tag::from_type_byte(b'x').is_none());
        assert!(Tag::from_type_byte(255).is_none());
    }

    #[test]
    fn booleans_carry_value_in_tag() {
        assert_eq!(Tag::for_leaf(&LeafValue::Boolean(true)).type_byte(), b'y');
        assert_eq!(Tag::for_leaf(&LeafValue::Boolean(false)).type_byte(), b'n');
    }

    #[test]
    fn long_strings_switch_tag() {
        let long = LeafValue::String("x".repeat(MAX_SHORT + 1));
        assert_eq!(Tag::for_leaf(&long), Tag::LongString);
        assert_eq!(Tag::for_leaf(&LeafValue::from("x")), Tag::String);
    }
}
