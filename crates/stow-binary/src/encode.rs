use bytes::{BufMut, Bytes, BytesMut};
use stow_types::{join_flags, Entry, LeafValue, NodeId, StoreError, StoreResult, Tree};

use crate::tag::{Tag, MAX_LONG, MAX_SHORT};

/// Encode a tree as a depth-first tag-length-value stream.
///
/// Detached subtrees are unreachable from the root and are not emitted.
pub fn encode(tree: &Tree) -> StoreResult<Bytes> {
    let mut out = BytesMut::with_capacity(256);
    write_fields(tree, tree.root(), &mut out)?;
    Ok(out.freeze())
}

fn write_fields(tree: &Tree, id: NodeId, out: &mut BytesMut) -> StoreResult<()> {
    for (name, entry) in tree.fields_iter(id) {
        match entry {
            Entry::Leaf(value) => {
                out.put_u8(Tag::for_leaf(value).type_byte());
                put_short(out, "name", name.as_bytes())?;
                put_payload(out, value)?;
            }
            Entry::Node(child) if tree.is_array(*child) => {
                out.put_u8(Tag::Array.type_byte());
                put_short(out, "name", name.as_bytes())?;
                for element in tree.elements(*child) {
                    out.put_u8(Tag::Complex.type_byte());
                    write_fields(tree, *element, out)?;
                    out.put_u8(Tag::End.type_byte());
                }
                out.put_u8(Tag::End.type_byte());
            }
            Entry::Node(child) => {
                out.put_u8(Tag::Complex.type_byte());
                put_short(out, "name", name.as_bytes())?;
                write_fields(tree, *child, out)?;
                out.put_u8(Tag::End.type_byte());
            }
        }
    }
    Ok(())
}

fn put_payload(out: &mut BytesMut, value: &LeafValue) -> StoreResult<()> {
    match value {
        LeafValue::String(s) if s.len() > MAX_SHORT => put_long(out, "string", s.as_bytes())?,
        LeafValue::String(s) => put_short(out, "string", s.as_bytes())?,
        LeafValue::Int(v) => out.put_i32(*v),
        LeafValue::Long(v) => out.put_i64(*v),
        LeafValue::Float(v) => out.put_f32(*v),
        LeafValue::Double(v) => out.put_f64(*v),
        LeafValue::Boolean(_) => {}
        LeafValue::Byte(v) => out.put_u8(*v),
        LeafValue::Char(c) => out.put_u32(u32::from(*c)),
        LeafValue::Flags(names) => put_short(out, "flag set", join_flags(names).as_bytes())?,
        LeafValue::StringArray(items) => {
            check_len("string array", items.len(), MAX_LONG)?;
            out.put_u32(items.len() as u32);
            for item in items {
                put_long(out, "string array entry", item.as_bytes())?;
            }
        }
    }
    Ok(())
}

fn put_short(out: &mut BytesMut, what: &'static str, data: &[u8]) -> StoreResult<()> {
    check_len(what, data.len(), MAX_SHORT)?;
    out.put_u16(data.len() as u16);
    out.put_slice(data);
    Ok(())
}

fn put_long(out: &mut BytesMut, what: &'static str, data: &[u8]) -> StoreResult<()> {
    check_len(what, data.len(), MAX_LONG)?;
    out.put_u32(data.len() as u32);
    out.put_slice(data);
    Ok(())
}

fn check_len(what: &'static str, len: usize, max: usize) -> StoreResult<()> {
    if len > max {
        return Err(StoreError::TooLong { what, len, max });
    }
    Ok(())
}

/// Reject names the stream cannot represent.
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    check_len("name", name.len(), MAX_SHORT)
}

/// Reject leaves whose payload the stream cannot represent.
pub(crate) fn validate_leaf(value: &LeafValue) -> StoreResult<()> {
    match value {
        LeafValue::String(s) => check_len("string", s.len(), MAX_LONG),
        LeafValue::Flags(names) => check_len("flag set", join_flags(names).len(), MAX_SHORT),
        LeafValue::StringArray(items) => {
            check_len("string array", items.len(), MAX_LONG)?;
            items
                .iter()
                .try_for_each(|item| check_len("string array entry", item.len(), MAX_LONG))
        }
        _ => Ok(()),
    }
}
