//! Entry name validation for markup stores.
//!
//! Entry names become element and attribute names, so they must be plain
//! XML names:
//! - Must be non-empty
//! - Must start with a letter or `_`
//! - May otherwise contain letters, digits, `_`, `-`, `.`
//! - Must not contain `:` (no namespace prefixes)
//! - Must not start with `xml` in any case

use stow_types::{StoreError, StoreResult};

/// Validate an entry name, returning `Ok(())` if it is usable as an XML name.
///
/// # Examples
///
/// ```
/// use stow_markup::validate_name;
///
/// assert!(validate_name("count").is_ok());
/// assert!(validate_name("_type").is_ok());
/// assert!(validate_name("").is_err());
/// assert!(validate_name("2nd").is_err());
/// ```
pub fn validate_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    let first = chars.next().ok_or_else(|| invalid("name must not be empty"))?;
    if !(first.is_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or '_'"));
    }

    if let Some(ch) = chars.find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))) {
        return Err(invalid(&format!("contains forbidden character: {ch:?}")));
    }

    if name.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml")) {
        return Err(invalid("must not start with 'xml'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(name: &str) -> String {
        match validate_name(name) {
            Err(StoreError::InvalidName { reason, .. }) => reason,
            other => panic!("expected invalid name, got {other:?}"),
        }
    }

    #[test]
    fn valid_names() {
        for name in ["a", "count", "_value", "item-2", "v1.x", "größe"] {
            assert!(validate_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn empty_name() {
        assert!(reason("").contains("empty"));
    }

    #[test]
    fn bad_first_character() {
        assert!(reason("1a").contains("start"));
        assert!(reason("-a").contains("start"));
    }

    #[test]
    fn forbidden_characters() {
        assert!(reason("a b").contains("forbidden"));
        assert!(reason("ns:a").contains("forbidden"));
        assert!(reason("a<b").contains("forbidden"));
    }

    #[test]
    fn xml_prefix_is_reserved() {
        assert!(reason("xmlns").contains("xml"));
        assert!(reason("XmlThing").contains("xml"));
        assert!(validate_name("xm").is_ok());
    }
}
