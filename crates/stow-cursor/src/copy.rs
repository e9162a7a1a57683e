use stow_types::{EntryKind, LeafKind, LeafValue, StoreResult};
use tracing::debug;

use crate::traits::Cursor;

/// Replay the complex under `src`'s cursor into the complex under `dst`'s.
///
/// Both cursors must be on a complex (or array element) and end where they
/// started. Untyped text entries are given the narrowest leaf kind their text
/// parses as.
pub fn copy_tree(src: &mut dyn Cursor, dst: &mut dyn Cursor) -> StoreResult<usize> {
    let copied = copy_complex(src, dst)?;
    debug!(entries = copied, "copied tree");
    Ok(copied)
}

fn copy_complex(src: &mut dyn Cursor, dst: &mut dyn Cursor) -> StoreResult<usize> {
    let mut copied = 0;
    for entry in src.entries()? {
        let name = entry.name.as_str();
        match entry.kind {
            EntryKind::Leaf(kind) => {
                dst.write_leaf(name, src.read_leaf(name, kind)?)?;
            }
            EntryKind::Text => {
                let text = src.read_leaf(name, LeafKind::String)?;
                dst.write_leaf(name, infer_leaf(text))?;
            }
            EntryKind::Complex => {
                src.enter_complex(name)?;
                dst.create_complex(name)?;
                copied += copy_complex(src, dst)?;
                dst.exit_complex()?;
                src.exit_complex()?;
            }
            EntryKind::Array => {
                src.enter_array(name)?;
                dst.create_array(name)?;
                for index in 0..src.array_length()? {
                    src.enter_array_element(index)?;
                    dst.create_array_element()?;
                    copied += copy_complex(src, dst)?;
                    dst.exit_array_element()?;
                    src.exit_array_element()?;
                }
                dst.exit_array()?;
                src.exit_array()?;
            }
        }
        copied += 1;
    }
    Ok(copied)
}

/// Pick a typed leaf for untyped text: i32, i64, bool, f64, then string.
fn infer_leaf(value: LeafValue) -> LeafValue {
    let LeafValue::String(text) = value else {
        return value;
    };
    [LeafKind::Int, LeafKind::Long, LeafKind::Boolean, LeafKind::Double]
        .into_iter()
        .find_map(|kind| LeafValue::parse_text(kind, &text))
        .filter(|parsed| parsed.to_text().as_deref() == Some(text.as_str()))
        .unwrap_or(LeafValue::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_integers_and_booleans() {
        assert_eq!(infer_leaf("3".into()), LeafValue::Int(3));
        assert_eq!(infer_leaf("4294967296".into()), LeafValue::Long(4294967296));
        assert_eq!(infer_leaf("true".into()), LeafValue::Boolean(true));
        assert_eq!(infer_leaf("2.5".into()), LeafValue::Double(2.5));
    }

    #[test]
    fn keeps_text_that_would_not_round_trip() {
        // Leading zeros and padding would be lost by a numeric leaf.
        assert_eq!(infer_leaf("007".into()), LeafValue::String("007".into()));
        assert_eq!(infer_leaf(" 3".into()), LeafValue::String(" 3".into()));
        assert_eq!(infer_leaf("hello".into()), LeafValue::String("hello".into()));
    }
}
