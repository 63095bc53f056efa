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

//! Workflow state machine
//!
//! A session walks one prompt through `Preview -> ContextSelection ->
//! Generate`. The final prompt and token estimate are recomputed from the
//! session inputs on every call and never stored.
//!
//! Generation is split in two phases so a UI can release the session while
//! the request is in flight: [`WorkflowSession::begin_generation`] hands out
//! a [`GenerationTicket`], and [`WorkflowSession::complete_generation`] only
//! applies a result whose ticket is still current. Closing the generation
//! view or resetting the session invalidates outstanding tickets, so a late
//! result is dropped instead of overwriting newer state.

use crate::analytics::UsageAnalyticsDispatcher;
use crate::composer::{compose, compose_labelled, to_plain_text};
use crate::context::ContextSelectionState;
use crate::tokens::{estimate, TokenEstimate};
use crate::{PromptError, Result, TextGenerator};
use acelo_core::Prompt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Preview,
    ContextSelection,
    Generate,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 3] = [
        WorkflowStep::Preview,
        WorkflowStep::ContextSelection,
        WorkflowStep::Generate,
    ];

    pub fn index(&self) -> usize {
        match self {
            WorkflowStep::Preview => 0,
            WorkflowStep::ContextSelection => 1,
            WorkflowStep::Generate => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn title(&self) -> &'static str {
        match self {
            WorkflowStep::Preview => "Preview",
            WorkflowStep::ContextSelection => "Context Selection",
            WorkflowStep::Generate => "Generate",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WorkflowStep::Preview => "Review the prompt template",
            WorkflowStep::ContextSelection => "Choose contexts to enhance the prompt",
            WorkflowStep::Generate => "Generate the final result",
        }
    }

    /// Following step, staying on the last one
    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1).unwrap_or(*self)
    }

    /// Preceding step, staying on the first one
    pub fn previous(&self) -> Self {
        self.index()
            .checked_sub(1)
            .and_then(Self::from_index)
            .unwrap_or(*self)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// How a step is drawn in the step indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Current,
    Upcoming,
}

/// Why the Generate action is disabled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateBlocked {
    #[error("session is at the {0} step")]
    WrongStep(WorkflowStep),
    #[error("final prompt is empty")]
    EmptyPrompt,
    #[error("estimated {total_tokens} tokens exceeds the limit")]
    OverLimit { total_tokens: u64 },
    #[error("a generation is already in progress")]
    InFlight,
}

/// Identifies one generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationTicket(u64);

/// Everything needed to call the generator outside the session
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub ticket: GenerationTicket,
    pub prompt: String,
    pub prompt_id: String,
    pub context_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The response was stored on the session
    Completed,
    /// The ticket was stale; the response was dropped
    Discarded,
}

/// Result of [`WorkflowSession::generate`]
#[derive(Debug)]
pub struct Generated {
    pub text: String,
    /// Background usage recording, if a dispatcher was supplied
    pub analytics: Option<JoinHandle<()>>,
}

/// Payload of the export action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExport {
    /// Prompt title
    pub prompt: String,
    /// Final composed prompt
    pub content: String,
    pub response: String,
    /// Titles of the selected contexts, in order
    pub contexts: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// One prompt's trip through the workflow
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    prompt: Prompt,
    step: WorkflowStep,
    selection: ContextSelectionState,
    generated_response: Option<String>,
    in_flight: Option<GenerationTicket>,
    epoch: u64,
    last_error: Option<String>,
}

impl WorkflowSession {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            step: WorkflowStep::Preview,
            selection: ContextSelectionState::default(),
            generated_response: None,
            in_flight: None,
            epoch: 0,
            last_error: None,
        }
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn selection(&self) -> &ContextSelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut ContextSelectionState {
        &mut self.selection
    }

    pub fn generated_response(&self) -> Option<&str> {
        self.generated_response.as_deref()
    }

    /// Message of the most recent failed generation
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Composed prompt; empty while the template itself is empty
    pub fn final_prompt(&self) -> String {
        if self.prompt.content.is_empty() {
            return String::new();
        }
        compose(
            &self.prompt.content,
            self.selection.selected_contexts(),
            self.selection.custom_context(),
        )
    }

    /// Final prompt with category labels, for display
    pub fn labelled_prompt(&self) -> String {
        if self.prompt.content.is_empty() {
            return String::new();
        }
        compose_labelled(
            &self.prompt.content,
            self.selection.selected_contexts(),
            self.selection.custom_context(),
        )
    }

    pub fn plain_text_prompt(&self) -> String {
        to_plain_text(&self.final_prompt())
    }

    pub fn token_estimate(&self) -> TokenEstimate {
        estimate(
            &self.prompt.content,
            self.selection.selected_contexts(),
            self.selection.custom_context(),
        )
    }

    // Navigation

    pub fn next(&mut self) -> WorkflowStep {
        self.go_to(self.step.next())
    }

    pub fn previous(&mut self) -> WorkflowStep {
        self.go_to(self.step.previous())
    }

    /// Jump straight to a step from the step indicator
    pub fn go_to(&mut self, step: WorkflowStep) -> WorkflowStep {
        if step != self.step {
            tracing::debug!(from = %self.step, to = %step, "Workflow step changed");
            self.step = step;
        }
        self.step
    }

    pub fn step_states(&self) -> Vec<(WorkflowStep, StepState)> {
        WorkflowStep::ALL
            .iter()
            .map(|&step| {
                let state = match step.cmp(&self.step) {
                    std::cmp::Ordering::Less => StepState::Completed,
                    std::cmp::Ordering::Equal => StepState::Current,
                    std::cmp::Ordering::Greater => StepState::Upcoming,
                };
                (step, state)
            })
            .collect()
    }

    /// Start over: back to Preview with an empty selection and no response.
    ///
    /// Any generation still in flight is discarded when it completes.
    pub fn reset(&mut self) {
        self.step = WorkflowStep::Preview;
        self.selection.clear();
        self.generated_response = None;
        self.in_flight = None;
        self.last_error = None;
        self.epoch += 1;
        tracing::debug!(prompt_id = %self.prompt.id, "Workflow reset");
    }

    // Generation

    /// Check whether Generate/Regenerate is currently enabled
    pub fn can_generate(&self) -> std::result::Result<(), GenerateBlocked> {
        if self.step != WorkflowStep::Generate {
            return Err(GenerateBlocked::WrongStep(self.step));
        }
        if self.in_flight.is_some() {
            return Err(GenerateBlocked::InFlight);
        }
        if self.final_prompt().trim().is_empty() {
            return Err(GenerateBlocked::EmptyPrompt);
        }
        let estimate = self.token_estimate();
        if !estimate.is_within_limits() {
            return Err(GenerateBlocked::OverLimit {
                total_tokens: estimate.total_tokens,
            });
        }
        Ok(())
    }

    /// Mark a generation as started and return what to send
    pub fn begin_generation(&mut self) -> Result<GenerationRequest> {
        self.can_generate().map_err(PromptError::GenerateBlocked)?;

        self.epoch += 1;
        let ticket = GenerationTicket(self.epoch);
        self.in_flight = Some(ticket);
        self.last_error = None;

        tracing::info!(
            prompt_id = %self.prompt.id,
            contexts = self.selection.len(),
            "Generating prompt response"
        );

        Ok(GenerationRequest {
            ticket,
            prompt: self.final_prompt(),
            prompt_id: self.prompt.id.clone(),
            context_ids: self.selection.context_ids(),
        })
    }

    /// Apply a generator result.
    ///
    /// A stale ticket yields [`GenerationOutcome::Discarded`] regardless of
    /// the result. A current failed result is returned as the collaborator
    /// error and leaves any earlier response in place.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: anyhow::Result<String>,
    ) -> Result<GenerationOutcome> {
        if self.in_flight != Some(ticket) {
            tracing::debug!(prompt_id = %self.prompt.id, "Discarding stale generation result");
            return Ok(GenerationOutcome::Discarded);
        }
        self.in_flight = None;

        match result {
            Ok(text) => {
                self.generated_response = Some(text);
                Ok(GenerationOutcome::Completed)
            }
            Err(e) => {
                tracing::error!(prompt_id = %self.prompt.id, "Generation failed: {:#}", e);
                self.last_error = Some(e.to_string());
                Err(PromptError::Collaborator(e))
            }
        }
    }

    /// Close the generation view without cancelling the request
    pub fn close_generation(&mut self) {
        if self.in_flight.take().is_some() {
            self.epoch += 1;
            tracing::debug!(prompt_id = %self.prompt.id, "Generation closed while in flight");
        }
    }

    /// Run one generation end to end.
    ///
    /// On success the usage record is dispatched in the background and
    /// never affects the returned result.
    pub async fn generate(
        &mut self,
        generator: &dyn TextGenerator,
        analytics: Option<&UsageAnalyticsDispatcher>,
    ) -> Result<Generated> {
        let request = self.begin_generation()?;
        let result = generator.generate(&request.prompt).await;
        let text = result.as_ref().ok().cloned();

        match self.complete_generation(request.ticket, result)? {
            GenerationOutcome::Completed => {
                let handle = analytics
                    .map(|dispatcher| dispatcher.dispatch(request.prompt_id, request.context_ids));
                Ok(Generated {
                    text: text.unwrap_or_default(),
                    analytics: handle,
                })
            }
            GenerationOutcome::Discarded => Ok(Generated {
                text: text.unwrap_or_default(),
                analytics: None,
            }),
        }
    }

    /// Generate again without leaving the Generate step
    pub async fn regenerate(
        &mut self,
        generator: &dyn TextGenerator,
        analytics: Option<&UsageAnalyticsDispatcher>,
    ) -> Result<Generated> {
        tracing::debug!(prompt_id = %self.prompt.id, "Regenerating");
        self.generate(generator, analytics).await
    }

    pub fn export(&self, timestamp: DateTime<Utc>) -> WorkflowExport {
        WorkflowExport {
            prompt: self.prompt.display_title().to_string(),
            content: self.final_prompt(),
            response: self.generated_response.clone().unwrap_or_default(),
            contexts: self
                .selection
                .selected_contexts()
                .iter()
                .map(|c| c.title.clone())
                .collect(),
            timestamp,
        }
    }

    pub fn export_json(&self, timestamp: DateTime<Utc>) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export(timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acelo_core::{Context, ContextCategory};

    fn session() -> WorkflowSession {
        WorkflowSession::new(Prompt::new("p1", "Outreach", "Write an email."))
    }

    #[test]
    fn test_initial_state() {
        let s = session();
        assert_eq!(s.step(), WorkflowStep::Preview);
        assert!(s.selection().is_empty());
        assert!(s.generated_response().is_none());
        assert!(!s.is_generating());
    }

    #[test]
    fn test_navigation_clamps() {
        let mut s = session();
        assert_eq!(s.previous(), WorkflowStep::Preview);
        assert_eq!(s.next(), WorkflowStep::ContextSelection);
        assert_eq!(s.next(), WorkflowStep::Generate);
        assert_eq!(s.next(), WorkflowStep::Generate);
        assert_eq!(s.go_to(WorkflowStep::Preview), WorkflowStep::Preview);
    }

    #[test]
    fn test_step_states() {
        let mut s = session();
        s.go_to(WorkflowStep::ContextSelection);
        let states: Vec<StepState> = s.step_states().into_iter().map(|(_, st)| st).collect();
        assert_eq!(
            states,
            vec![StepState::Completed, StepState::Current, StepState::Upcoming]
        );
    }

    #[test]
    fn test_generate_gate() {
        let mut s = session();
        assert_eq!(
            s.can_generate(),
            Err(GenerateBlocked::WrongStep(WorkflowStep::Preview))
        );

        // zero contexts is allowed
        s.go_to(WorkflowStep::Generate);
        assert_eq!(s.can_generate(), Ok(()));

        let mut empty = WorkflowSession::new(Prompt::new("p2", "Empty", "   "));
        empty.go_to(WorkflowStep::Generate);
        assert_eq!(empty.can_generate(), Err(GenerateBlocked::EmptyPrompt));

        s.selection_mut().set_custom_context("x".repeat(16_004));
        assert!(matches!(
            s.can_generate(),
            Err(GenerateBlocked::OverLimit { .. })
        ));
    }

    #[test]
    fn test_empty_template_blocks_generate_despite_custom_context() {
        let mut s = WorkflowSession::new(Prompt::new("p", "t", ""));
        s.go_to(WorkflowStep::Generate);
        s.selection_mut().set_custom_context("notes");
        assert_eq!(s.final_prompt(), "");
        assert_eq!(s.labelled_prompt(), "");
        assert_eq!(s.can_generate(), Err(GenerateBlocked::EmptyPrompt));
    }

    #[test]
    fn test_in_flight_blocks_second_generation() {
        let mut s = session();
        s.go_to(WorkflowStep::Generate);
        let _request = s.begin_generation().unwrap();
        assert!(s.is_generating());
        assert!(matches!(
            s.begin_generation(),
            Err(PromptError::GenerateBlocked(GenerateBlocked::InFlight))
        ));
    }

    #[test]
    fn test_late_result_discarded_after_close() {
        let mut s = session();
        s.go_to(WorkflowStep::Generate);
        let request = s.begin_generation().unwrap();
        s.close_generation();
        let outcome = s
            .complete_generation(request.ticket, Ok("late".into()))
            .unwrap();
        assert_eq!(outcome, GenerationOutcome::Discarded);
        assert!(s.generated_response().is_none());
    }

    #[test]
    fn test_late_result_discarded_after_reset() {
        let mut s = session();
        s.go_to(WorkflowStep::Generate);
        let request = s.begin_generation().unwrap();
        s.reset();
        let outcome = s
            .complete_generation(request.ticket, Err(anyhow::anyhow!("boom")))
            .unwrap();
        assert_eq!(outcome, GenerationOutcome::Discarded);
        assert!(s.last_error().is_none());
    }

    #[test]
    fn test_failure_keeps_step_and_previous_response() {
        let mut s = session();
        s.go_to(WorkflowStep::Generate);
        let first = s.begin_generation().unwrap();
        s.complete_generation(first.ticket, Ok("v1".into())).unwrap();

        let second = s.begin_generation().unwrap();
        let err = s
            .complete_generation(second.ticket, Err(anyhow::anyhow!("upstream 500")))
            .unwrap_err();
        assert_eq!(err.to_string(), "upstream 500");
        assert_eq!(s.step(), WorkflowStep::Generate);
        assert_eq!(s.generated_response(), Some("v1"));
        assert_eq!(s.last_error(), Some("upstream 500"));
        assert!(!s.is_generating());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = session();
        s.selection_mut()
            .select(Context::new("a", "A", ContextCategory::MarketResearch, "a"));
        s.selection_mut().set_custom_context("c");
        s.go_to(WorkflowStep::Generate);
        let r = s.begin_generation().unwrap();
        s.complete_generation(r.ticket, Ok("done".into())).unwrap();

        s.reset();
        assert_eq!(s.step(), WorkflowStep::Preview);
        assert!(s.selection().is_empty());
        assert_eq!(s.selection().custom_context(), "");
        assert!(s.generated_response().is_none());
    }

    #[test]
    fn test_export() {
        let mut s = session();
        s.selection_mut()
            .select(Context::new("a", "Persona", ContextCategory::ClientProfiles, "CTO"));
        s.go_to(WorkflowStep::Generate);
        let r = s.begin_generation().unwrap();
        assert!(r.prompt.contains("1. Persona:\nCTO"));
        s.complete_generation(r.ticket, Ok("Dear CTO".into())).unwrap();

        let at = Utc::now();
        let export = s.export(at);
        assert_eq!(export.prompt, "Outreach");
        assert_eq!(export.response, "Dear CTO");
        assert_eq!(export.contexts, vec!["Persona"]);
        assert_eq!(export.content, s.final_prompt());

        let json: serde_json::Value = serde_json::from_str(&s.export_json(at).unwrap()).unwrap();
        assert_eq!(json["prompt"], "Outreach");
        assert_eq!(json["contexts"][0], "Persona");
    }
}
