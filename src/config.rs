//! Configuration loading.
//!
//! Looks for `geomerge.toml` in the working directory, then
//! `<config dir>/geomerge/config.toml`. The first file found wins; no file
//! at all means defaults.
//!
//! ```toml
//! project_id = "my-project"
//! output_table = "raw.merged"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MergeError, MergeResult};
use crate::DEFAULT_OUTPUT_TABLE;

pub const LOCAL_CONFIG: &str = "geomerge.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project that owns both the source tables and the output table.
    pub project_id: Option<String>,
    /// `dataset.table` to create or replace.
    pub output_table: Option<String>,
}

impl Config {
    pub fn from_toml(content: &str) -> MergeResult<Self> {
        toml::from_str(content).map_err(|e| MergeError::Config(e.to_string()))
    }

    /// Load `path`, or `None` if it does not exist.
    pub fn load_from(path: &Path) -> MergeResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MergeError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Ok(Some(config))
    }

    /// Candidate config files, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("geomerge").join("config.toml"));
        }
        paths
    }

    /// Load the first config file found, or defaults.
    pub fn discover() -> MergeResult<Self> {
        for path in Self::search_paths() {
            if let Some(config) = Self::load_from(&path)? {
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    pub fn new(project_id: Option<String>, output_table: Option<String>) -> Self {
        Self {
            project_id,
            output_table,
        }
    }

    /// Merge the three sources of a target, highest precedence last:
    /// command-line flags (and their environment variables) beat the request
    /// envelope, which beats the config file. Unset fields fall through.
    pub fn resolve(file: Config, envelope: Config, flags: Config) -> Self {
        let config = flags.or(envelope).or(file);
        debug!(project = ?config.project_id, output = ?config.output_table, "resolved target");
        config
    }

    /// Fill fields unset here from `fallback`.
    fn or(self, fallback: Config) -> Self {
        Self {
            project_id: self.project_id.or(fallback.project_id),
            output_table: self.output_table.or(fallback.output_table),
        }
    }

    pub fn project_id(&self) -> MergeResult<&str> {
        self.project_id
            .as_deref()
            .ok_or_else(|| MergeError::Config("no project id configured".to_string()))
    }

    pub fn output_table(&self) -> &str {
        self.output_table.as_deref().unwrap_or(DEFAULT_OUTPUT_TABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml("project_id = \"proj\"\noutput_table = \"raw.merged\"\n").unwrap();
        assert_eq!(config.project_id().unwrap(), "proj");
        assert_eq!(config.output_table(), "raw.merged");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.output_table(), "raw.results");
        assert!(matches!(config.project_id(), Err(MergeError::Config(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(Config::from_toml("project = \"x\""), Err(MergeError::Config(_))));
    }

    #[test]
    fn test_resolve_precedence() {
        let file = Config::from_toml("project_id = \"file\"\noutput_table = \"raw.file\"").unwrap();
        let envelope = Config::new(Some("envelope".into()), Some("raw.envelope".into()));
        let flags = Config::new(Some("flag".into()), None);

        let config = Config::resolve(file.clone(), envelope.clone(), flags);
        assert_eq!(config.project_id().unwrap(), "flag");
        assert_eq!(config.output_table(), "raw.envelope");

        let config = Config::resolve(file.clone(), envelope, Config::default());
        assert_eq!(config.project_id().unwrap(), "envelope");

        let config = Config::resolve(file, Config::new(None, Some("raw.envelope".into())), Config::default());
        assert_eq!(config.project_id().unwrap(), "file");
        assert_eq!(config.output_table(), "raw.envelope");
    }

    #[test]
    fn test_resolve_nothing_set() {
        let config = Config::resolve(Config::default(), Config::default(), Config::default());
        assert_eq!(config, Config::default());
        assert_eq!(config.output_table(), "raw.results");
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("geomerge-does-not-exist.toml");
        assert_eq!(Config::load_from(&path).unwrap(), None);
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("geomerge-config-{}.toml", std::process::id()));
        std::fs::write(&path, "project_id = \"from-file\"\n").unwrap();
        let config = Config::load_from(&path).unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("from-file"));
    }
}
