// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! Backend collaborators for Acelo
//!
//! Authentication, the per-user row store (with its query cache), object
//! storage, the serverless generation and automation functions, the
//! automation webhook fan-out, and the [`Acelo`] facade that scopes all of
//! them to the signed-in user.

pub mod analytics;
pub mod automation;
pub mod cache;
pub mod error;
pub mod functions;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;

pub use analytics::{usage_history, StoreUsageRecorder};
pub use automation::{AutomationInvoker, AutomationRunner};
pub use cache::{CacheStats, CachedStore, QueryCache};
pub use error::{BackendError, Result};
pub use functions::FunctionsClient;
pub use service::Acelo;
pub use session::{require_user, AuthClient, Session};
pub use storage::{HttpObjectStorage, InMemoryObjectStorage, ObjectStorage};
pub use store::{Collection, DataStore, InMemoryDataStore, Query, RestDataStore};
