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

//! Fire-and-forget usage analytics
//!
//! A generation is recorded after it succeeds. Recording runs on its own
//! task and its outcome never reaches the generation result: errors and
//! panics from the recorder are logged and dropped.

use crate::UsageRecorder;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct UsageAnalyticsDispatcher {
    recorder: Arc<dyn UsageRecorder>,
}

impl UsageAnalyticsDispatcher {
    pub fn new(recorder: Arc<dyn UsageRecorder>) -> Self {
        Self { recorder }
    }

    /// Record one generation in the background.
    ///
    /// Must be called from within a Tokio runtime. The returned handle only
    /// exists so callers can wait for the record in tests or on shutdown;
    /// dropping it does not cancel the task.
    pub fn dispatch(&self, prompt_id: impl Into<String>, context_ids: Vec<String>) -> JoinHandle<()> {
        let recorder = Arc::clone(&self.recorder);
        let prompt_id = prompt_id.into();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(recorder.record(&prompt_id, &context_ids))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(
                        prompt_id = %prompt_id,
                        contexts = context_ids.len(),
                        "Recorded prompt usage"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(prompt_id = %prompt_id, "Failed to record prompt usage: {:#}", e);
                }
                Err(_) => {
                    tracing::warn!(prompt_id = %prompt_id, "Usage recorder panicked");
                }
            }
        })
    }
}

impl std::fmt::Debug for UsageAnalyticsDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAnalyticsDispatcher").finish_non_exhaustive()
    }
}
