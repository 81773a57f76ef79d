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

use super::{ResourcePath, Significance};
use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};

/// The serialized form of a reference from one resource to another.
///
/// Field order is the wire order: the tag of the cache that manages the
/// target, its path, and the significance it should be loaded with. Encoded
/// with the standard `bincode` configuration, strings are length-prefixed and
/// the significance is a single integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Tag of the cache that owns the target resource.
    pub manager_tag: String,
    /// Path of the target, optionally relative to a named root.
    pub path: ResourcePath,
    /// Retention tier to load the target with.
    pub significance: Significance,
}

impl ResourceRef {
    /// Creates a new reference.
    pub fn new(
        manager_tag: impl Into<String>,
        path: impl Into<ResourcePath>,
        significance: Significance,
    ) -> Self {
        Self {
            manager_tag: manager_tag.into(),
            path: path.into(),
            significance,
        }
    }

    /// Encodes the reference into its binary wire form.
    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CacheError::Wire(e.to_string()))
    }

    /// Decodes a reference from its binary wire form.
    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        let (reference, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CacheError::Wire(e.to_string()))?;
        Ok(reference)
    }
}
