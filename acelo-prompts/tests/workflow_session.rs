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

//! End-to-end workflow sessions against in-process collaborators

use acelo_core::{Context, ContextCategory, Prompt};
use acelo_prompts::{
    PromptError, TextGenerator, UsageAnalyticsDispatcher, UsageRecorder, WorkflowSession,
    WorkflowStep,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct EchoGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(format!("generated #{}", self.prompts.lock().len()))
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("Edge function returned 502")
    }
}

#[derive(Default)]
struct CollectingRecorder {
    records: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl UsageRecorder for CollectingRecorder {
    async fn record(&self, prompt_id: &str, context_ids: &[String]) -> anyhow::Result<()> {
        self.records
            .lock()
            .push((prompt_id.to_string(), context_ids.to_vec()));
        Ok(())
    }
}

struct BrokenRecorder;

#[async_trait]
impl UsageRecorder for BrokenRecorder {
    async fn record(&self, _prompt_id: &str, _context_ids: &[String]) -> anyhow::Result<()> {
        anyhow::bail!("permission denied for table prompt_usage_analytics")
    }
}

fn ctx(id: &str, title: &str) -> Context {
    Context::new(id, title, ContextCategory::BrandVoiceGuidelines, format!("{title} notes"))
}

fn session_at_generate() -> WorkflowSession {
    let mut session = WorkflowSession::new(Prompt::new("prompt-1", "Launch post", "Write a launch post."));
    session.next();
    for (id, title) in [("a", "A"), ("b", "B"), ("c", "C")] {
        session.selection_mut().select(ctx(id, title));
    }
    session.next();
    session
}

#[tokio::test]
async fn test_generate_sends_composed_prompt_and_records_usage() {
    let mut session = session_at_generate();
    session.selection_mut().set_custom_context("Keep it short");

    let generator = EchoGenerator::default();
    let recorder = Arc::new(CollectingRecorder::default());
    let dispatcher = UsageAnalyticsDispatcher::new(recorder.clone());

    let generated = session.generate(&generator, Some(&dispatcher)).await.unwrap();
    assert_eq!(generated.text, "generated #1");
    assert_eq!(session.generated_response(), Some("generated #1"));
    generated.analytics.unwrap().await.unwrap();

    let sent = generator.prompts.lock()[0].clone();
    assert_eq!(sent, session.final_prompt());
    assert!(sent.contains("\n4. Custom Context:\nKeep it short\n"));

    let records = recorder.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, "prompt-1");
    assert_eq!(records[0].1, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_reorder_changes_numbering() {
    let mut session = session_at_generate();
    let reordered = vec![ctx("c", "C"), ctx("a", "A"), ctx("b", "B")];
    session.selection_mut().reorder(reordered).unwrap();

    let generator = EchoGenerator::default();
    session.generate(&generator, None).await.unwrap();

    let sent = generator.prompts.lock()[0].clone();
    let first = sent.find("1. C:").unwrap();
    let second = sent.find("2. A:").unwrap();
    let third = sent.find("3. B:").unwrap();
    assert!(first < second && second < third);
}

#[tokio::test]
async fn test_failed_generation_surfaces_error_and_stays_on_step() {
    let mut session = session_at_generate();
    let recorder = Arc::new(CollectingRecorder::default());
    let dispatcher = UsageAnalyticsDispatcher::new(recorder.clone());

    let err = session
        .generate(&FailingGenerator, Some(&dispatcher))
        .await
        .unwrap_err();
    assert!(matches!(err, PromptError::Collaborator(_)));
    assert_eq!(err.to_string(), "Edge function returned 502");
    assert_eq!(session.step(), WorkflowStep::Generate);
    assert!(session.generated_response().is_none());
    assert!(!session.is_generating());

    tokio::task::yield_now().await;
    assert!(recorder.records.lock().is_empty());
}

#[tokio::test]
async fn test_recorder_failure_does_not_affect_generation() {
    let mut session = session_at_generate();
    let dispatcher = UsageAnalyticsDispatcher::new(Arc::new(BrokenRecorder));

    let generated = session
        .generate(&EchoGenerator::default(), Some(&dispatcher))
        .await
        .unwrap();
    assert!(generated.analytics.unwrap().await.is_ok());
    assert_eq!(session.generated_response(), Some("generated #1"));
}

#[tokio::test]
async fn test_regenerate_overwrites_response() {
    let mut session = session_at_generate();
    let generator = EchoGenerator::default();

    session.generate(&generator, None).await.unwrap();
    session.regenerate(&generator, None).await.unwrap();
    assert_eq!(session.step(), WorkflowStep::Generate);
    assert_eq!(session.generated_response(), Some("generated #2"));
}

#[tokio::test]
async fn test_late_result_after_close_is_dropped() {
    let mut session = session_at_generate();
    let request = session.begin_generation().unwrap();

    // The view is closed while the request is still running elsewhere.
    session.close_generation();
    let response = EchoGenerator::default().generate(&request.prompt).await;
    session
        .complete_generation(request.ticket, response)
        .unwrap();

    assert!(session.generated_response().is_none());
    // A fresh generation is possible again.
    assert!(session.can_generate().is_ok());
}

#[tokio::test]
async fn test_start_over() {
    let mut session = session_at_generate();
    session.generate(&EchoGenerator::default(), None).await.unwrap();

    session.reset();
    assert_eq!(session.step(), WorkflowStep::Preview);
    assert!(session.selection().is_empty());
    assert!(session.generated_response().is_none());
    assert_eq!(session.final_prompt(), "Write a launch post.");
}
