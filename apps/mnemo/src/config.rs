//! # Configuration
//!
//! `mnemo.toml` describes where the object store lives and which domain
//! types it holds:
//!
//! ```toml
//! [store]
//! path = "mnemo.redb"
//!
//! [[types]]
//! name = "Person"
//! fields = [
//!     { name = "name", kind = "value" },
//!     { name = "team", kind = "one_to_one" },
//! ]
//! ```
//!
//! A missing file means the built-in Team/Person schema and the default
//! store path. A file that exists but does not parse is an error.

use mnemo_core::{MnemoError, TypeRegistry, TypeSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Store path used when neither the CLI nor the config names one.
pub const DEFAULT_STORE_PATH: &str = "mnemo.redb";

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "mnemo.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

/// The schema used when the config declares no types.
#[must_use]
pub fn default_types() -> Vec<TypeSpec> {
    vec![
        TypeSpec::new("Team").value("name").one_to_many("members"),
        TypeSpec::new("Person").value("name").one_to_one("team"),
    ]
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, MnemoError> {
        toml::from_str(content)
            .map_err(|e| MnemoError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Read `path`, falling back to the default config if it does not exist.
    pub fn load(path: &Path) -> Result<Self, MnemoError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| MnemoError::IoError(format!("Read config: {}", e)))?;
        Self::parse(&content)
    }

    /// The metamodel described by `[[types]]`, or the default schema.
    pub fn to_registry(&self) -> Result<TypeRegistry, MnemoError> {
        if self.types.is_empty() {
            TypeRegistry::from_specs(default_types())
        } else {
            TypeRegistry::from_specs(self.types.iter().cloned())
        }
    }

    /// CLI path first, then `[store] path`, then [`DEFAULT_STORE_PATH`].
    #[must_use]
    pub fn store_path(&self, cli_path: Option<PathBuf>) -> PathBuf {
        cli_path
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{FieldKind, Metamodel};

    #[test]
    fn empty_config_uses_default_schema() {
        let config = Config::parse("").expect("parse");
        let registry = config.to_registry().expect("registry");

        assert_eq!(registry.len(), 2);
        assert!(registry.contains_type("Team"));
        assert_eq!(config.store_path(None), PathBuf::from(DEFAULT_STORE_PATH));
    }

    #[test]
    fn types_and_store_path_are_read() {
        let config = Config::parse(
            r#"
            [store]
            path = "objects.redb"

            [[types]]
            name = "Invoice"
            fields = [
                { name = "number", kind = "value" },
                { name = "lines", kind = "one_to_many" },
            ]

            [[types]]
            name = "Line"
            fields = [{ name = "amount", kind = "value" }]
            "#,
        )
        .expect("parse");

        let registry = config.to_registry().expect("registry");
        let fields = registry.fields_of("Invoice").expect("invoice");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].kind, FieldKind::OneToMany);
        assert!(!registry.contains_type("Team"));
        assert_eq!(config.store_path(None), PathBuf::from("objects.redb"));
        assert_eq!(
            config.store_path(Some(PathBuf::from("cli.redb"))),
            PathBuf::from("cli.redb")
        );
    }

    #[test]
    fn unknown_field_kind_is_rejected() {
        let result = Config::parse(
            r#"
            [[types]]
            name = "Person"
            fields = [{ name = "name", kind = "float" }]
            "#,
        );
        assert!(matches!(result, Err(MnemoError::SerializationError(_))));
    }

    #[test]
    fn missing_file_is_default() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = Config::load(&temp.path().join("absent.toml")).expect("load");
        assert!(config.types.is_empty());
    }
}
