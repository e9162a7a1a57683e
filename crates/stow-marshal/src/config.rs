use serde::{Deserialize, Serialize};

/// Reserved entry names written by the marshaller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// String leaf naming the type of the value in a complex.
    pub type_field: String,
    /// Leaf holding a primitive written at top level.
    pub value_field: String,
    /// Entry holding the elements of a top-level sequence.
    pub items_field: String,
    /// Array holding the pairs of a top-level map.
    pub entries_field: String,
    pub key_field: String,
    pub value_entry: String,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            type_field: "_type".into(),
            value_field: "_value".into(),
            items_field: "_items".into(),
            entries_field: "_entries".into(),
            key_field: "key".into(),
            value_entry: "value".into(),
        }
    }
}

impl MarshalConfig {
    /// Whether a field name collides with a reserved entry of an object.
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.type_field || name == self.value_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = MarshalConfig::default();
        assert_eq!(c.type_field, "_type");
        assert_eq!(c.entries_field, "_entries");
        assert!(c.is_reserved("_type"));
        assert!(!c.is_reserved("key"));
    }

    #[test]
    fn partial_toml() {
        let c: MarshalConfig = toml::from_str("type_field = \"kind\"").unwrap();
        assert_eq!(c.type_field, "kind");
        assert_eq!(c.value_field, "_value");
    }
}
