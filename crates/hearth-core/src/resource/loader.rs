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

use crate::error::LoadError;
use std::path::Path;

/// The domain-specific capability a resource cache is generic over.
///
/// A loader turns a canonical path into the *cached* representation of a
/// resource and converts between the cached and the *active* representation.
/// Mesh, texture or shader support is added by implementing this trait; the
/// cache itself never looks inside either representation.
///
/// # Threading
///
/// [`load_from_path`](ResourceLoader::load_from_path) runs on a scheduler
/// worker and may call into any cache, including its own (e.g. to resolve a
/// [`ResourceRef`](super::ResourceRef) to a dependency).
/// [`materialize`](ResourceLoader::materialize) and
/// [`dematerialize`](ResourceLoader::dematerialize) run on the thread driving
/// the cache while its tables are locked, so they must not call back into the
/// same cache.
///
/// # Examples
///
/// ```
/// use hearth_core::{LoadError, ResourceLoader};
/// use std::path::Path;
///
/// struct ShaderLoader;
///
/// impl ResourceLoader for ShaderLoader {
///     type Cached = String;
///     type Active = Vec<u32>;
///
///     fn load_from_path(&self, path: &Path) -> Result<String, LoadError> {
///         std::fs::read_to_string(path).map_err(|e| LoadError::new(path, e))
///     }
///
///     fn materialize(&self, source: String) -> Vec<u32> {
///         source.bytes().map(u32::from).collect()
///     }
///
///     fn dematerialize(&self, words: &Vec<u32>) -> String {
///         words.iter().map(|&w| w as u8 as char).collect()
///     }
/// }
/// ```
pub trait ResourceLoader: Send + Sync + 'static {
    /// Cheap, retainable form of the resource.
    type Cached: Send + 'static;
    /// Fully materialized, directly usable form of the resource.
    type Active: Send + Sync + 'static;

    /// Reads the resource at `path` into its cached representation.
    fn load_from_path(&self, path: &Path) -> Result<Self::Cached, LoadError>;

    /// Converts a cached representation into an active one.
    fn materialize(&self, cached: Self::Cached) -> Self::Active;

    /// Derives a cached representation back from an active one.
    ///
    /// `materialize(dematerialize(x))` must be content-equal to `x`.
    fn dematerialize(&self, active: &Self::Active) -> Self::Cached;
}
