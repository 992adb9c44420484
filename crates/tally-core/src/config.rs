//! Reader configuration.
//!
//! Layered via figment, highest priority last:
//!
//! 1. Default values
//! 2. Configuration file (`tally.toml`)
//! 3. Environment variables (`TALLY_*`)
//!
//! Hosts (e.g. the CLI) apply their own flag overrides on top of the
//! extracted config.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::IndexOptions;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tally.toml";

/// Options applied when opening an index for reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Decode all postings into memory at open time.
    pub preload: bool,
    /// Bitmap cache bound in bytes; 0 disables the cache.
    pub cache_size_bytes: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            preload: false,
            cache_size_bytes: 0,
        }
    }
}

impl IndexConfig {
    /// Loads the configuration from `tally.toml` (or `file`, when
    /// given) and `TALLY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a layer fails to parse.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        figment = match file {
            Some(path) => figment.merge(Toml::file_exact(path)),
            None => figment.merge(Toml::file(CONFIG_FILE)),
        };
        figment
            .merge(Env::prefixed("TALLY_"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Converts the configuration into open options.
    #[must_use]
    pub fn to_options(&self) -> IndexOptions {
        let mut options = IndexOptions::new().preload(self.preload);
        if self.cache_size_bytes > 0 {
            options = options.lru_cache(self.cache_size_bytes);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_preload_and_cache() {
        let config = IndexConfig::default();
        assert!(!config.preload);
        assert_eq!(config.cache_size_bytes, 0);
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "preload = true\ncache_size_bytes = 1024\n").unwrap();

        let config = IndexConfig::load(Some(&path)).unwrap();
        assert!(config.preload);
        assert_eq!(config.cache_size_bytes, 1024);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        // Toml::file tolerates a missing default config file.
        let config = IndexConfig::load(Some(&dir.path().join("absent.toml")));
        // file_exact on an explicit path reports the absence instead.
        assert!(config.is_err());

        let config = IndexConfig::load(None).unwrap();
        assert_eq!(config, IndexConfig::default());
    }
}
