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

//! Serverless function endpoints

use crate::automation::AutomationRunner;
use crate::error::{check_response, BackendError, Result};
use acelo_core::automation::AutomationRunResult;
use acelo_core::config::{BackendConfig, FunctionsConfig};
use acelo_prompts::TextGenerator;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    generated_text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the `generate-prompt` and `invoke-automation` functions
pub struct FunctionsClient {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    functions: FunctionsConfig,
    client: reqwest::Client,
}

impl FunctionsClient {
    pub fn new(backend: &BackendConfig, functions: &FunctionsConfig) -> Self {
        Self {
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            access_token: None,
            functions: functions.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    async fn invoke<T: DeserializeOwned>(&self, name: &str, body: &Value) -> Result<T> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        let response = self
            .client
            .post(format!("{}/functions/v1/{}", self.base_url, name))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Turn a composed prompt into generated text
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let response: GenerateResponse = self
            .invoke(
                &self.functions.generate_prompt,
                &serde_json::json!({ "prompt": prompt }),
            )
            .await?;

        if let Some(error) = response.error {
            return Err(BackendError::Api {
                status: 500,
                message: error,
            });
        }
        response.generated_text.ok_or_else(|| BackendError::Api {
            status: 500,
            message: "response is missing generatedText".to_string(),
        })
    }

    /// Ask the backend to run an automation with `input_data`
    pub async fn invoke_automation(
        &self,
        automation_id: &str,
        input_data: &Value,
    ) -> Result<AutomationRunResult> {
        tracing::info!(automation_id = %automation_id, "Invoking automation");
        self.invoke(
            &self.functions.invoke_automation,
            &serde_json::json!({ "automationId": automation_id, "inputData": input_data }),
        )
        .await
    }
}

#[async_trait]
impl TextGenerator for FunctionsClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(self.generate_text(prompt).await?)
    }
}

/// The backend resolves the user from the access token
#[async_trait]
impl AutomationRunner for FunctionsClient {
    async fn run(
        &self,
        _user_id: &str,
        automation_id: &str,
        input_data: Value,
    ) -> Result<AutomationRunResult> {
        self.invoke_automation(automation_id, &input_data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acelo_core::automation::RunStatus;

    fn client(url: &str) -> FunctionsClient {
        FunctionsClient::new(
            &BackendConfig {
                url: url.to_string(),
                anon_key: "anon".into(),
            },
            &FunctionsConfig::default(),
        )
        .with_access_token("jwt")
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_only() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/functions/v1/generate-prompt")
            .match_header("authorization", "Bearer jwt")
            .match_body(mockito::Matcher::Json(serde_json::json!({"prompt": "Write a haiku."})))
            .with_status(200)
            .with_body(r#"{"generatedText":"Autumn moonlight"}"#)
            .expect(1)
            .create_async()
            .await;

        let text = client(&server.url()).generate("Write a haiku.").await.unwrap();
        assert_eq!(text, "Autumn moonlight");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/generate-prompt")
            .with_status(500)
            .with_body(r#"{"error":"OpenAI API key not configured"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).generate("x").await.unwrap_err();
        assert!(err.to_string().contains("OpenAI API key not configured"));
    }

    #[tokio::test]
    async fn test_invoke_automation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/invoke-automation")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"automationId": "auto-1"}),
            ))
            .with_status(200)
            .with_body(r#"{"success":true,"runId":"run-1","status":"completed","output":{"ok":true},"duration":42}"#)
            .create_async()
            .await;

        let result = client(&server.url())
            .invoke_automation("auto-1", &serde_json::json!({"email_address": "a@b.co"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.duration, Some(42));
    }
}
