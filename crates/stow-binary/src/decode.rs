use std::io::Read;

use bytes::{Buf, Bytes};
use stow_types::{split_flags, LeafValue, NodeId, StoreError, StoreResult, Tree};
use tracing::debug;

use crate::tag::Tag;

/// Parse a complete stream into a tree.
///
/// Any malformed or truncated input aborts the whole decode.
pub fn decode(data: impl Into<Bytes>) -> StoreResult<Tree> {
    let mut input = Input::new(data.into());
    let mut tree = Tree::new();
    let mut stack = vec![tree.root()];

    while input.has_remaining() {
        let offset = input.offset();
        let byte = input.u8()?;
        let tag = Tag::from_type_byte(byte).ok_or_else(|| StoreError::Decode {
            offset,
            reason: format!("unknown tag byte 0x{byte:02x}"),
        })?;
        let current = *stack.last().unwrap_or(&NodeId::ROOT);

        if tag == Tag::End {
            if stack.len() == 1 {
                return Err(input.error_at(offset, "end tag at root level"));
            }
            stack.pop();
            continue;
        }

        if tree.is_array(current) {
            if tag != Tag::Complex {
                return Err(input.error_at(offset, "array may only hold element complexes"));
            }
            stack.push(tree.push_element(current)?);
            continue;
        }

        let name = input.short_string()?;
        match tag {
            Tag::Complex => stack.push(tree.add_complex(current, &name)?),
            Tag::Array => stack.push(tree.add_array(current, &name)?),
            _ => {
                let value = input.payload(tag)?;
                tree.set_leaf(current, &name, value)?;
            }
        }
    }

    if stack.len() > 1 {
        return Err(input.error_at(
            input.offset(),
            &format!("{} container(s) left open", stack.len() - 1),
        ));
    }
    debug!(bytes = input.len, nodes = tree.arena_len(), "decoded binary store");
    Ok(tree)
}

/// Read a reader to end of input and parse it.
pub fn decode_reader<R: Read>(mut reader: R) -> StoreResult<Tree> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode(data)
}

/// Bounds-checked view over the input with offset tracking.
struct Input {
    buf: Bytes,
    len: usize,
}

impl Input {
    fn new(buf: Bytes) -> Self {
        let len = buf.len();
        Self { buf, len }
    }

    fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn error_at(&self, offset: usize, reason: &str) -> StoreError {
        StoreError::Decode {
            offset,
            reason: reason.to_string(),
        }
    }

    fn need(&self, n: usize, what: &str) -> StoreResult<()> {
        if self.buf.remaining() < n {
            return Err(self.error_at(
                self.offset(),
                &format!("truncated {what}: need {n} bytes, have {}", self.buf.remaining()),
            ));
        }
        Ok(())
    }

    fn u8(&mut self) -> StoreResult<u8> {
        self.need(1, "byte")?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> StoreResult<u16> {
        self.need(2, "length")?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> StoreResult<u32> {
        self.need(4, "u32")?;
        Ok(self.buf.get_u32())
    }

    fn utf8(&mut self, len: usize) -> StoreResult<String> {
        self.need(len, "string")?;
        let offset = self.offset();
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| self.error_at(offset, "invalid UTF-8"))
    }

    fn short_string(&mut self) -> StoreResult<String> {
        let len = self.u16()? as usize;
        self.utf8(len)
    }

    fn long_string(&mut self) -> StoreResult<String> {
        let len = self.u32()? as usize;
        self.utf8(len)
    }

    fn payload(&mut self, tag: Tag) -> StoreResult<LeafValue> {
        let value = match tag {
            Tag::String => LeafValue::String(self.short_string()?),
            Tag::LongString => LeafValue::String(self.long_string()?),
            Tag::Int => {
                self.need(4, "i32")?;
                LeafValue::Int(self.buf.get_i32())
            }
            Tag::Long => {
                self.need(8, "i64")?;
                LeafValue::Long(self.buf.get_i64())
            }
            Tag::Float => {
                self.need(4, "f32")?;
                LeafValue::Float(self.buf.get_f32())
            }
            Tag::Double => {
                self.need(8, "f64")?;
                LeafValue::Double(self.buf.get_f64())
            }
            Tag::True => LeafValue::Boolean(true),
            Tag::False => LeafValue::Boolean(false),
            Tag::Byte => LeafValue::Byte(self.u8()?),
            Tag::Char => {
                let offset = self.offset();
                let raw = self.u32()?;
                let c = char::from_u32(raw).ok_or_else(|| {
                    self.error_at(offset, &format!("invalid char scalar 0x{raw:x}"))
                })?;
                LeafValue::Char(c)
            }
            Tag::Flags => LeafValue::Flags(split_flags(&self.short_string()?)),
            Tag::StringArray => {
                let count = self.u32()? as usize;
                // Each entry needs at least its length prefix.
                self.need(count.saturating_mul(4), "string array")?;
                let items = (0..count)
                    .map(|_| self.long_string())
                    .collect::<StoreResult<Vec<_>>>()?;
                LeafValue::StringArray(items)
            }
            Tag::Complex | Tag::Array | Tag::End => {
                return Err(self.error_at(self.offset(), "container tag in leaf position"));
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stow_types::LeafKind;

    use crate::encode::encode;

    fn decode_err(data: &[u8]) -> (usize, String) {
        match decode(data.to_vec()) {
            Err(StoreError::Decode { offset, reason }) => (offset, reason),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    // ---------------------------------------------------------------
    // Valid streams
    // ---------------------------------------------------------------

    #[test]
    fn empty_stream_is_empty_root() {
        let tree = decode(Vec::new()).unwrap();
        assert!(tree.entries(tree.root()).unwrap().is_empty());
    }

    #[test]
    fn decodes_leaves_and_containers() {
        let data = [
            b'i', 0, 1, b'n', 0, 0, 0, 3, // n = 3
            b'a', 0, 1, b'a', // array a
            b'o', b'y', 0, 1, b'f', b'z', // element { f = true }
            b'z', // end a
            b's', 0, 1, b's', 0, 2, b'h', b'i', // s = "hi"
        ];
        let tree = decode(data.to_vec()).unwrap();
        let root = tree.root();
        assert_eq!(tree.leaf(root, "n", LeafKind::Int).unwrap(), &LeafValue::Int(3));
        assert_eq!(
            tree.leaf(root, "s", LeafKind::String).unwrap(),
            &LeafValue::String("hi".into())
        );
        let list = tree.child(root, "a", true).unwrap();
        let element = tree.element(list, 0).unwrap();
        assert_eq!(
            tree.leaf(element, "f", LeafKind::Boolean).unwrap(),
            &LeafValue::Boolean(true)
        );
    }

    #[test]
    fn reencodes_identically() {
        let data: Vec<u8> = vec![
            b'o', 0, 1, b'c', b'c', 0, 1, b'x', 0, 0, 0, 0x41, b'z', b'e', 0, 1, b'e', 0, 3,
            b'A', b' ', b'B',
        ];
        let tree = decode(data.clone()).unwrap();
        assert_eq!(&encode(&tree).unwrap()[..], &data[..]);
    }

    // ---------------------------------------------------------------
    // Corrupt streams
    // ---------------------------------------------------------------

    #[test]
    fn unknown_tag_fails() {
        let (offset, reason) = decode_err(&[b'q']);
        assert_eq!(offset, 0);
        assert!(reason.contains("unknown tag"));
    }

    #[test]
    fn truncated_payload_fails() {
        let (_, reason) = decode_err(&[b'i', 0, 1, b'n', 0, 0]);
        assert!(reason.contains("truncated"));
    }

    #[test]
    fn truncated_name_fails() {
        decode_err(&[b's', 0, 5, b'a']);
    }

    #[test]
    fn invalid_utf8_fails() {
        let (offset, reason) = decode_err(&[b's', 0, 1, 0xff, 0, 0]);
        assert_eq!(offset, 3);
        assert!(reason.contains("UTF-8"));
    }

    #[test]
    fn end_at_root_fails() {
        let (_, reason) = decode_err(&[b'z']);
        assert!(reason.contains("root"));
    }

    #[test]
    fn unclosed_container_fails() {
        let (_, reason) = decode_err(&[b'o', 0, 1, b'c']);
        assert!(reason.contains("left open"));
    }

    #[test]
    fn leaf_directly_in_array_fails() {
        decode_err(&[b'a', 0, 1, b'a', b'i', 0, 1, b'n', 0, 0, 0, 1, b'z']);
    }

    #[test]
    fn invalid_char_fails() {
        let (_, reason) = decode_err(&[b'c', 0, 1, b'c', 0, 0, 0xd8, 0x00]);
        assert!(reason.contains("char"));
    }

    #[test]
    fn oversized_string_array_count_fails_fast() {
        decode_err(&[b'r', 0, 1, b'r', 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn reader_io_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }
        assert!(matches!(decode_reader(Broken), Err(StoreError::Io(_))));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn leaf() -> impl Strategy<Value = LeafValue> {
            prop_oneof![
                ".{0,20}".prop_map(LeafValue::String),
                any::<i32>().prop_map(LeafValue::Int),
                any::<i64>().prop_map(LeafValue::Long),
                any::<f32>().prop_map(LeafValue::Float),
                any::<f64>().prop_map(LeafValue::Double),
                any::<bool>().prop_map(LeafValue::Boolean),
                any::<u8>().prop_map(LeafValue::Byte),
                any::<char>().prop_map(LeafValue::Char),
                prop::collection::vec("[A-Z]{1,6}", 0..4).prop_map(LeafValue::Flags),
                prop::collection::vec(".{0,8}", 0..4).prop_map(LeafValue::StringArray),
            ]
        }

        fn fields() -> impl Strategy<Value = Vec<(String, LeafValue)>> {
            prop::collection::vec(("[a-z]{1,8}", leaf()), 0..8)
        }

        proptest! {
            #[test]
            fn encode_decode_encode_is_stable(
                top in fields(),
                elements in prop::collection::vec(fields(), 0..4),
            ) {
                let mut tree = Tree::new();
                let root = tree.root();
                for (name, value) in &top {
                    tree.set_leaf(root, name, value.clone()).unwrap();
                }
                let list = tree.add_array(root, "items").unwrap();
                for element in &elements {
                    let id = tree.push_element(list).unwrap();
                    for (name, value) in element {
                        tree.set_leaf(id, name, value.clone()).unwrap();
                    }
                }

                let first = encode(&tree).unwrap();
                let decoded = decode(first.clone()).unwrap();
                let second = encode(&decoded).unwrap();
                prop_assert_eq!(first, second);

                let list = decoded.child(decoded.root(), "items", true).unwrap();
                prop_assert_eq!(decoded.array_len(list).unwrap(), elements.len());
            }
        }
    }
}
