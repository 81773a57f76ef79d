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

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A resource path as written by the application, before canonicalization.
///
/// The textual form `@root/relative/file` names a directory-prefix key that is
/// resolved through [`CacheConfig::roots`]; any other text is a plain path
/// resolved against [`CacheConfig::base_dir`] (or the working directory).
///
/// This is the form that travels inside a [`ResourceRef`](super::ResourceRef),
/// so references stay valid when the asset tree is relocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    root: Option<String>,
    relative: String,
}

impl ResourcePath {
    /// A plain path without a directory-prefix key.
    pub fn new(relative: impl Into<String>) -> Self {
        Self {
            root: None,
            relative: relative.into(),
        }
    }

    /// A path relative to the directory registered under `root`.
    pub fn rooted(root: impl Into<String>, relative: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            relative: relative.into(),
        }
    }

    /// Parses the textual form, recognizing a leading `@root/` prefix.
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('@') {
            Some(rest) => match rest.split_once('/') {
                Some((root, relative)) => Self::rooted(root, relative),
                None => Self::rooted(rest, ""),
            },
            None => Self::new(text),
        }
    }

    /// The directory-prefix key, if any.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// The path below the root (or below the base directory).
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Resolves the path against `config` and canonicalizes it.
    ///
    /// # Errors
    /// Returns [`CacheError::UnknownRoot`] if the prefix key is not configured.
    pub fn resolve(&self, config: &CacheConfig) -> CacheResult<PathBuf> {
        let base = match &self.root {
            Some(root) => config
                .roots
                .get(root)
                .cloned()
                .ok_or_else(|| CacheError::UnknownRoot(root.clone()))?,
            None => match &config.base_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir().unwrap_or_default(),
            },
        };
        Ok(canonicalize(&base.join(&self.relative)))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "@{root}/{}", self.relative),
            None => f.write_str(&self.relative),
        }
    }
}

impl From<&str> for ResourcePath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for ResourcePath {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<&Path> for ResourcePath {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

/// Returns the canonical form of `path`, used as the deduplication key.
///
/// The path is normalized lexically (`a/./b` and `a/c/../b` name the same
/// resource), then its longest existing ancestor is resolved through the
/// filesystem, symlinks included, and the missing tail is appended. A file
/// therefore keeps its key when it is created after it was first requested.
/// Symlinks created later inside the missing tail are not followed.
pub fn canonicalize(path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);
    let mut missing = Vec::new();
    let mut existing = normalized.as_path();
    loop {
        if let Ok(resolved) = std::fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(resolved, |dir, name| dir.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
