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

//! # Hearth Core
//!
//! Foundational crate containing the types, traits and interface contracts
//! shared by every part of the Hearth resource cache.
//!
//! Nothing in here knows how resources are stored. It defines the common
//! language the cache engine, the schedulers and the domain loaders speak:
//! identifiers, significance tiers, resource paths and their wire form, the
//! [`ResourceLoader`](resource::ResourceLoader) capability and the
//! [`TaskScheduler`](task::TaskScheduler) contract.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod resource;
pub mod task;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, LoadError};
pub use resource::{
    ResourceId, ResourceLoader, ResourcePath, ResourceRef, ResourceState, Significance,
};
pub use task::{submit, Job, TaskFuture, TaskScheduler};
