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

//! Identifiers, significance tiers and the loader capability for cached resources.
//!
//! A resource lives in two forms: a cheap *cached* representation that is
//! inexpensive to retain, and an *active* representation that is directly
//! usable (e.g. resident on the GPU). The [`ResourceLoader`] trait is the entire
//! domain-specific surface needed to move between them; everything else in the
//! cache is generic.

mod loader;
mod path;
mod reference;

pub use loader::ResourceLoader;
pub use path::{canonicalize, ResourcePath};
pub use reference::ResourceRef;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// An opaque, per-cache identifier for a deduplicated resource path.
///
/// Ids are allocated monotonically and are never reused within one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wraps a raw id value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Retention policy applied when the usage count of a resource drops to zero.
///
/// - `Low`: drop every representation, the next use reloads from disk.
/// - `Medium`: keep the cheap cached copy warm for fast reactivation.
/// - `High`: pin the active representation for the lifetime of the cache.
///
/// On the wire the tier is its underlying integer (`Low = 0`, `Medium = 1`,
/// `High = 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Significance {
    /// Load once, discard immediately when unused.
    Low = 0,
    /// Demote to the cached representation when unused.
    #[default]
    Medium = 1,
    /// Keep the active representation once loaded.
    High = 2,
}

impl Significance {
    /// Converts the wire integer back into a tier.
    pub fn from_repr(value: u8) -> Option<Self> {
        match value {
            0 => Some(Significance::Low),
            1 => Some(Significance::Medium),
            2 => Some(Significance::High),
            _ => None,
        }
    }

    /// Returns the wire integer of the tier.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for Significance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Significance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Significance::from_repr(value).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Unsigned(value.into()), &"0, 1 or 2")
        })
    }
}

/// Observable residency state of a resource slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// A background load is in flight.
    Loading,
    /// Only the cached representation is resident.
    Cached,
    /// The active representation is resident.
    Active,
    /// The last load failed; the error is kept until an explicit reload.
    Failed,
    /// Nothing is resident.
    Unloaded,
}
