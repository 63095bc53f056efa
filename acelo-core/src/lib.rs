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

//! Acelo Core
//!
//! Shared data model for the Acelo dashboard: prompts, contexts, usage
//! analytics, automations, coaches and assets, plus configuration and
//! form validation.

pub mod analytics;
pub mod asset;
pub mod automation;
pub mod coach;
pub mod config;
pub mod context;
pub mod error;
pub mod prompt;
pub mod stats;
pub mod validation;

pub use analytics::{NewPromptUsage, PromptUsageAnalytics};
pub use asset::AssetFile;
pub use automation::{
    Automation, AutomationExecutionData, AutomationFormData, AutomationInputSchema,
    AutomationPayloadItem, AutomationRun, AutomationRunInputData, AutomationRunResult,
    EnhancedAutomationFormData, RunStatus, PROMPT_CONTEXT_AUTOMATION, PROMPT_CONTEXT_RUN,
};
pub use coach::{Coach, CoachFormData};
pub use config::AceloConfig;
pub use context::{Context, ContextCategory, ContextFormData};
pub use error::{Result, ValidationError};
pub use prompt::{Prompt, PromptFormData, PromptVersion};
pub use stats::DashboardStats;
