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

//! Automation fan-out
//!
//! Runs one automation for one user: look the automation up, record a
//! `running` run, call its webhook and record how the call ended. A failed
//! webhook never rolls back the run; it is marked `failed` instead.

use crate::error::{BackendError, Result};
use crate::store::{Collection, DataStore, Query};
use acelo_core::automation::{Automation, AutomationRunResult, RunStatus};
use acelo_core::config::AutomationConfig;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something that can run an automation on behalf of a user
#[async_trait]
pub trait AutomationRunner: Send + Sync {
    async fn run(
        &self,
        user_id: &str,
        automation_id: &str,
        input_data: Value,
    ) -> Result<AutomationRunResult>;
}

pub struct AutomationInvoker {
    store: Arc<dyn DataStore>,
    client: reqwest::Client,
    timeout: Duration,
}

impl AutomationInvoker {
    pub fn new(store: Arc<dyn DataStore>, config: &AutomationConfig) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.webhook_timeout_secs),
        }
    }

    pub async fn invoke(
        &self,
        user_id: &str,
        automation_id: &str,
        input_data: Value,
    ) -> Result<AutomationRunResult> {
        if automation_id.trim().is_empty() {
            return Err(BackendError::Automation("Automation ID is required".to_string()));
        }

        let automation = self.fetch_automation(user_id, automation_id).await?;
        if !automation.active {
            return Err(BackendError::Automation("Automation is not active".to_string()));
        }
        let webhook_url = automation
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| BackendError::Automation("Automation has no webhook URL".to_string()))?;

        let run = self
            .store
            .insert(
                Collection::AutomationRuns,
                json!({
                    "automation_id": automation_id,
                    "user_id": user_id,
                    "input_data": input_data,
                    "status": RunStatus::Running,
                }),
            )
            .await?;
        let run_id = run
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| BackendError::Automation("Failed to create automation run".to_string()))?;

        tracing::info!(
            automation_id = %automation_id,
            run_id = %run_id,
            user_id = %user_id,
            "Calling automation webhook"
        );

        let payload = webhook_payload(input_data, automation_id, &run_id, user_id);
        let started = Instant::now();

        match self.call_webhook(webhook_url, &payload).await {
            Ok((status, output)) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                let error_message = match status {
                    RunStatus::Failed => output.get("error").cloned(),
                    _ => None,
                };
                self.record_run(
                    &run_id,
                    json!({
                        "output_data": output,
                        "status": status,
                        "duration_ms": duration_ms,
                        "error_message": error_message,
                    }),
                )
                .await;

                tracing::info!(
                    automation_id = %automation_id,
                    run_id = %run_id,
                    status = status.as_str(),
                    duration_ms,
                    "Automation finished"
                );

                Ok(AutomationRunResult {
                    success: status == RunStatus::Completed,
                    run_id,
                    status,
                    output: Some(output),
                    duration: Some(duration_ms),
                })
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::error!(run_id = %run_id, "Webhook execution error: {}", e);
                self.record_run(
                    &run_id,
                    json!({
                        "status": RunStatus::Failed,
                        "error_message": e.to_string(),
                        "duration_ms": duration_ms,
                    }),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn fetch_automation(&self, user_id: &str, automation_id: &str) -> Result<Automation> {
        let query = Query::new(Collection::Automations)
            .eq("id", automation_id)
            .eq("user_id", user_id)
            .limit(1);
        let row = self
            .store
            .select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("Automation not found".to_string()))?;
        Ok(serde_json::from_value(row)?)
    }

    /// POST the payload and classify the response
    async fn call_webhook(&self, url: &str, payload: &Value) -> Result<(RunStatus, Value)> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let body = response.text().await?;

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            let output = json!({
                "error": format!("HTTP {}: {}", status.as_u16(), reason),
                "response": body,
            });
            return Ok((RunStatus::Failed, output));
        }

        let output = if is_json {
            serde_json::from_str(&body)?
        } else {
            json!({ "response": body })
        };
        Ok((RunStatus::Completed, output))
    }

    /// Best effort; a failed update is logged and the run result still returned
    async fn record_run(&self, run_id: &str, patch: Value) {
        let query = Query::new(Collection::AutomationRuns).eq("id", run_id);
        if let Err(e) = self.store.update(&query, patch).await {
            tracing::warn!(run_id = %run_id, "Failed to update automation run: {}", e);
        }
    }
}

#[async_trait]
impl AutomationRunner for AutomationInvoker {
    async fn run(
        &self,
        user_id: &str,
        automation_id: &str,
        input_data: Value,
    ) -> Result<AutomationRunResult> {
        self.invoke(user_id, automation_id, input_data).await
    }
}

/// `{...input_data, automation_id, run_id, user_id}`
fn webhook_payload(input_data: Value, automation_id: &str, run_id: &str, user_id: &str) -> Value {
    let mut payload = match input_data {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other);
            map
        }
    };
    payload.insert("automation_id".to_string(), json!(automation_id));
    payload.insert("run_id".to_string(), json!(run_id));
    payload.insert("user_id".to_string(), json!(user_id));
    Value::Object(payload)
}
