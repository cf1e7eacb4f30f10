//! Plugin manifests.
//!
//! A manifest names one native library, the visibility it must be loaded
//! with, an optional search root, and the entry points the host expects:
//!
//! ```json
//! {
//!   "name": "dummy_op",
//!   "library": "libdummy_op.so",
//!   "visibility": "global",
//!   "search_root": "lib",
//!   "symbols": [{ "name": "vector_add", "arity": 4, "doc": "out = a + b" }]
//! }
//! ```
//!
//! A relative `search_root` is anchored at the manifest's own directory, so a
//! plugin package can ship its library next to its manifest.

use std::path::{Path, PathBuf};

use opbridge::{BridgeConfig, SymbolSpec, Visibility};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest is missing a non-empty '{0}'")]
    MissingField(&'static str),
    #[error("symbol #{index} has an empty name")]
    EmptySymbolName { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl SymbolDecl {
    #[must_use]
    pub fn to_spec(&self) -> SymbolSpec {
        SymbolSpec {
            name: self.name.clone(),
            arity: self.arity,
            doc: self.doc.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub library: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_root: Option<PathBuf>,
    #[serde(default)]
    pub symbols: Vec<SymbolDecl>,
}

fn default_visibility() -> String {
    Visibility::Local.as_str().to_string()
}

impl PluginManifest {
    /// Parse and validate a manifest from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest file, anchoring a relative search root at the file's
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        let mut manifest = Self::from_json(&content)?;
        if let Some(root) = manifest.search_root.take() {
            let anchored = if root.is_absolute() {
                root
            } else {
                path.parent().unwrap_or(Path::new(".")).join(root)
            };
            manifest.search_root = Some(anchored);
        }
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::MissingField("name"));
        }
        if self.library.trim().is_empty() {
            return Err(ManifestError::MissingField("library"));
        }
        if let Some(index) = self.symbols.iter().position(|s| s.name.trim().is_empty()) {
            return Err(ManifestError::EmptySymbolName { index });
        }
        Ok(())
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        Visibility::from_str_loose(&self.visibility)
    }

    #[must_use]
    pub fn specs(&self) -> Vec<SymbolSpec> {
        self.symbols.iter().map(SymbolDecl::to_spec).collect()
    }

    /// Bridge configuration for this plugin: the manifest's search root wins
    /// over `base`.
    #[must_use]
    pub fn config(&self, base: &BridgeConfig) -> BridgeConfig {
        match &self.search_root {
            Some(root) => base.clone().with_search_root(root),
            None => base.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "dummy_op",
        "library": "libdummy_op.so",
        "visibility": "Global",
        "symbols": [
            { "name": "vector_add", "arity": 4, "doc": "out = a + b" },
            { "name": "opA" }
        ]
    }"#;

    #[test]
    fn parses_sample() {
        let m = PluginManifest::from_json(SAMPLE).unwrap();
        assert_eq!(m.visibility(), Visibility::Global);
        let specs = m.specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].arity, Some(4));
        assert_eq!(specs[1].arity, None);
        assert_eq!(m.config(&BridgeConfig::new()), BridgeConfig::new());
    }

    #[test]
    fn visibility_defaults_to_local() {
        let m = PluginManifest::from_json(r#"{"name":"n","library":"libn.so"}"#).unwrap();
        assert_eq!(m.visibility(), Visibility::Local);
        assert!(m.symbols.is_empty());
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(matches!(
            PluginManifest::from_json(r#"{"name":"","library":"libn.so"}"#),
            Err(ManifestError::MissingField("name"))
        ));
        assert!(matches!(
            PluginManifest::from_json(r#"{"name":"n","library":" "}"#),
            Err(ManifestError::MissingField("library"))
        ));
        assert!(matches!(
            PluginManifest::from_json(r#"{"name":"n","library":"l","symbols":[{"name":""}]}"#),
            Err(ManifestError::EmptySymbolName { index: 0 })
        ));
        assert!(matches!(
            PluginManifest::from_json("{"),
            Err(ManifestError::Json(_))
        ));
    }

    #[test]
    fn relative_search_root_is_anchored_at_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.json");
        std::fs::write(
            &path,
            r#"{"name":"n","library":"libn.so","search_root":"lib"}"#,
        )
        .unwrap();

        let m = PluginManifest::from_file(&path).unwrap();
        assert_eq!(m.search_root.as_deref(), Some(dir.path().join("lib").as_path()));
        let cfg = m.config(&BridgeConfig::new().with_search_root("/elsewhere"));
        assert_eq!(cfg.search_root(), Some(dir.path().join("lib").as_path()));
    }
}
