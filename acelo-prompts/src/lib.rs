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

//! Prompt composition workflow
//!
//! Combines a stored prompt template with selected context documents and
//! free-text custom context, estimates the token cost of the result and
//! drives the Preview -> Context Selection -> Generate flow that submits it
//! to a text generation endpoint.

pub mod analytics;
pub mod composer;
pub mod context;
pub mod suggestions;
pub mod tokens;
pub mod workflow;

use async_trait::async_trait;
use thiserror::Error;

pub use analytics::UsageAnalyticsDispatcher;
pub use composer::{compose, compose_labelled, to_plain_text, CONTEXT_HEADER};
pub use context::{filter_contexts, ContextSelectionState, SearchResults, SearchStats};
pub use suggestions::{suggested_contexts, SuggestionRanker};
pub use tokens::{estimate, estimate_tokens, TokenEstimate, TokenStatus};
pub use workflow::{
    GenerateBlocked, Generated, GenerationOutcome, GenerationRequest, GenerationTicket, StepState,
    WorkflowExport, WorkflowSession, WorkflowStep,
};

pub type Result<T> = std::result::Result<T, PromptError>;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),
    #[error("Index {index} out of range for {len} selected contexts")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Generate is not available: {0}")]
    GenerateBlocked(GenerateBlocked),
    /// Collaborator failure, passed through unchanged
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

// Traits for collaborators

/// Remote text generation endpoint
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send the composed prompt and return the generated text
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Sink for usage analytics records
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, prompt_id: &str, context_ids: &[String]) -> anyhow::Result<()>;
}
