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

//! Usage analytics persisted in `prompt_usage_analytics`

use crate::error::Result;
use crate::store::{Collection, DataStore, Query};
use acelo_core::{NewPromptUsage, PromptUsageAnalytics};
use acelo_prompts::UsageRecorder;
use async_trait::async_trait;
use std::sync::Arc;

/// Records one row per successful generation for a fixed user
pub struct StoreUsageRecorder {
    store: Arc<dyn DataStore>,
    user_id: String,
}

impl StoreUsageRecorder {
    pub fn new(store: Arc<dyn DataStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl UsageRecorder for StoreUsageRecorder {
    async fn record(&self, prompt_id: &str, context_ids: &[String]) -> anyhow::Result<()> {
        let row = NewPromptUsage {
            user_id: self.user_id.clone(),
            prompt_id: prompt_id.to_string(),
            context_ids: context_ids.to_vec(),
        };
        self.store
            .insert(Collection::PromptUsageAnalytics, serde_json::to_value(row)?)
            .await?;
        Ok(())
    }
}

/// Most recent usage records of a prompt, newest first
pub async fn usage_history(
    store: &dyn DataStore,
    user_id: &str,
    prompt_id: &str,
    limit: usize,
) -> Result<Vec<PromptUsageAnalytics>> {
    let query = Query::new(Collection::PromptUsageAnalytics)
        .eq("user_id", user_id)
        .eq("prompt_id", prompt_id)
        .order_by("generated_at", false)
        .limit(limit);

    store
        .select(&query)
        .await?
        .into_iter()
        .map(|row| Ok(serde_json::from_value(row)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDataStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_then_read_history() {
        let store: Arc<dyn DataStore> = Arc::new(InMemoryDataStore::new());
        let recorder = StoreUsageRecorder::new(store.clone(), "u1");
        recorder
            .record("p1", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        recorder.record("p2", &["c".to_string()]).await.unwrap();

        let history = usage_history(store.as_ref(), "u1", "p1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].context_ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_limited() {
        let store = InMemoryDataStore::new();
        for (i, at) in ["2024-01-01T00:00:00Z", "2024-03-01T00:00:00Z", "2024-02-01T00:00:00Z"]
            .iter()
            .enumerate()
        {
            store
                .insert(
                    Collection::PromptUsageAnalytics,
                    json!({
                        "id": format!("r{i}"),
                        "user_id": "u1",
                        "prompt_id": "p1",
                        "context_ids": [],
                        "generated_at": at,
                    }),
                )
                .await
                .unwrap();
        }

        let history = usage_history(&store, "u1", "p1", 2).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }
}
