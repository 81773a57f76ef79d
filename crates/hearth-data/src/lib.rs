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

//! # Hearth Data
//!
//! The resource cache engine.
//!
//! - [`ResourceCache`]: per-domain deduplication, state machine and retention policy.
//! - [`ResourceHandle`]: the client-facing, reference-counted handle.
//! - [`ResourceRegistry`]: the process-wide tag → cache lookup used to resolve
//!   references between resources.

#![warn(missing_docs)]

pub mod cache;
pub mod handle;
pub mod registry;

pub use cache::{CacheBuilder, ResourceCache};
pub use handle::ResourceHandle;
pub use registry::ResourceRegistry;
