//! Bridge configuration.
//!
//! The search root for relative library paths is set via the
//! `OPBRIDGE_SEARCH_ROOT` environment variable, or programmatically with
//! [`BridgeConfig::with_search_root`]. When neither is set, relative inputs
//! resolve against the current working directory.

use std::path::{Path, PathBuf};

/// Environment variable overriding the library search root.
pub const SEARCH_ROOT_ENV: &str = "OPBRIDGE_SEARCH_ROOT";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    search_root: Option<PathBuf>,
}

impl BridgeConfig {
    /// Configuration with no search root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(SEARCH_ROOT_ENV).map(PathBuf::from))
    }

    fn from_env_value(raw: Option<PathBuf>) -> Self {
        // An exported-but-empty variable means "unset".
        let search_root = raw.filter(|p| !p.as_os_str().is_empty());
        Self { search_root }
    }

    #[must_use]
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn search_root(&self) -> Option<&Path> {
        self.search_root.as_deref()
    }

    /// Directory relative inputs are joined onto.
    pub fn base_dir(&self) -> std::io::Result<PathBuf> {
        match &self.search_root {
            Some(root) if root.is_absolute() => Ok(root.clone()),
            Some(root) => Ok(std::env::current_dir()?.join(root)),
            None => std::env::current_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_search_root() {
        assert_eq!(BridgeConfig::default().search_root(), None);
        assert_eq!(BridgeConfig::new(), BridgeConfig::default());
    }

    #[test]
    fn env_value_empty_means_unset() {
        assert_eq!(
            BridgeConfig::from_env_value(Some(PathBuf::new())).search_root(),
            None
        );
        assert_eq!(BridgeConfig::from_env_value(None).search_root(), None);
        assert_eq!(
            BridgeConfig::from_env_value(Some(PathBuf::from("/opt/ops"))).search_root(),
            Some(Path::new("/opt/ops"))
        );
    }

    #[test]
    fn explicit_override_wins() {
        let cfg = BridgeConfig::from_env_value(Some(PathBuf::from("/opt/a")))
            .with_search_root("/opt/b");
        assert_eq!(cfg.search_root(), Some(Path::new("/opt/b")));
    }

    #[test]
    fn base_dir_anchors_relative_roots_at_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let cfg = BridgeConfig::new().with_search_root("plugins");
        assert_eq!(cfg.base_dir().unwrap(), cwd.join("plugins"));
        assert_eq!(BridgeConfig::new().base_dir().unwrap(), cwd);
    }
}
