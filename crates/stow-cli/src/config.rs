use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stow_markup::MarkupConfig;
use stow_marshal::MarshalConfig;

/// Settings shared by every command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StowConfig {
    pub markup: MarkupConfig,
    pub marshal: MarshalConfig,
}

impl StowConfig {
    /// Load from a TOML file, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        assert_eq!(StowConfig::load(None).unwrap(), StowConfig::default());
    }

    #[test]
    fn loads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stow.toml");
        std::fs::write(&path, "[markup]\nroot = \"save\"\n\n[marshal]\ntype_field = \"kind\"\n").unwrap();
        let config = StowConfig::load(Some(&path)).unwrap();
        assert_eq!(config.markup.root, "save");
        assert_eq!(config.markup.item_tag, "item");
        assert_eq!(config.marshal.type_field, "kind");
    }

    #[test]
    fn bad_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[markup\n").unwrap();
        let err = StowConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
