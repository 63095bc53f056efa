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

//! Prompt usage analytics records
//!
//! One record is appended per successful generation. Records are never
//! updated; they only feed the context suggestion ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptUsageAnalytics {
    pub id: String,
    pub user_id: String,
    pub prompt_id: String,
    #[serde(default)]
    pub context_ids: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Insert payload; the backend assigns `id` and `generated_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPromptUsage {
    pub user_id: String,
    pub prompt_id: String,
    pub context_ids: Vec<String>,
}
