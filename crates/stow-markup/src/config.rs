use serde::{Deserialize, Serialize};

/// Reserved vocabulary and layout of markup stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Name of the document element written for new stores.
    pub root: String,
    /// Attribute that marks arrays and string arrays.
    pub type_attribute: String,
    pub array_marker: String,
    pub strings_marker: String,
    /// Tag of array elements.
    pub item_tag: String,
    /// Tag of string-array entries.
    pub entry_tag: String,
    /// Spaces per nesting level when saving.
    pub indent: usize,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            root: "store".into(),
            type_attribute: "type".into(),
            array_marker: "array".into(),
            strings_marker: "strings".into(),
            item_tag: "item".into(),
            entry_tag: "entry".into(),
            indent: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = MarkupConfig::default();
        assert_eq!(c.root, "store");
        assert_eq!(c.type_attribute, "type");
        assert_eq!(c.item_tag, "item");
        assert_eq!(c.indent, 2);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c: MarkupConfig = toml::from_str("root = \"save\"\nindent = 4\n").unwrap();
        assert_eq!(c.root, "save");
        assert_eq!(c.indent, 4);
        assert_eq!(c.array_marker, "array");
    }
}
