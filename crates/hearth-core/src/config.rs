// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration for one resource cache instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for a resource cache.
///
/// Every field has a default, so a configuration file only needs to list the
/// values it overrides:
///
/// ```
/// use hearth_core::CacheConfig;
///
/// let config = CacheConfig::from_ron_str(
///     r#"(base_dir: Some("/game"), roots: {"textures": "/game/data/tex"})"#,
/// )
/// .unwrap();
/// assert!(!config.purge_on_evict);
/// assert_eq!(config.roots["textures"].to_str(), Some("/game/data/tex"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory plain (non-rooted) paths are resolved against.
    /// Defaults to the process working directory.
    pub base_dir: Option<PathBuf>,
    /// Named directory prefixes usable as `@key/relative` in resource paths.
    pub roots: HashMap<String, PathBuf>,
    /// When set, evicting a low-significance resource also drops its id and
    /// path-index entry instead of keeping them for a later reload.
    pub purge_on_evict: bool,
}

impl CacheConfig {
    /// Sets the directory plain paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Registers a named directory prefix.
    pub fn with_root(mut self, key: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.roots.insert(key.into(), dir.into());
        self
    }

    /// Enables purging of evicted low-significance entries.
    pub fn with_purge_on_evict(mut self, purge: bool) -> Self {
        self.purge_on_evict = purge;
        self
    }

    /// Parses a configuration written in RON.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ron_yields_defaults() {
        let config = CacheConfig::from_ron_str("()").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn builder_methods() {
        let config = CacheConfig::default()
            .with_base_dir("/srv/assets")
            .with_root("meshes", "/srv/assets/meshes")
            .with_purge_on_evict(true);

        assert_eq!(config.base_dir, Some(PathBuf::from("/srv/assets")));
        assert_eq!(config.roots.len(), 1);
        assert!(config.purge_on_evict);
    }

    #[test]
    fn malformed_ron_is_rejected() {
        assert!(CacheConfig::from_ron_str("(purge_on_evict: maybe)").is_err());
    }
}
