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

//! Automations backed by external n8n webhooks, and their run records

use crate::error::ValidationError;
use crate::validation::{require, validate_email, validate_webhook_url};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Input schema tag for prompt/context automations
pub const PROMPT_CONTEXT_AUTOMATION: &str = "prompt_context_automation";

/// `automation_type` tag carried by run input data
pub const PROMPT_CONTEXT_RUN: &str = "prompt_context";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub input_schema: Option<AutomationInputSchema>,
    #[serde(default)]
    pub default_email: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub requires_prompt: bool,
    pub requires_context: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_context_ids: Option<Vec<String>>,
}

/// Basic create/update form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationFormData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl AutomationFormData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        if let Some(url) = self.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            validate_webhook_url(url)?;
        }
        Ok(())
    }
}

/// Form for prompt/context automations, which always need a webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedAutomationFormData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    pub webhook_url: String,
    pub requires_prompt: bool,
    pub requires_context: bool,
    #[serde(default)]
    pub default_prompt_id: Option<String>,
    #[serde(default)]
    pub default_context_ids: Option<Vec<String>>,
}

impl EnhancedAutomationFormData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        validate_webhook_url(&self.webhook_url)?;
        Ok(())
    }

    pub fn input_schema(&self) -> AutomationInputSchema {
        AutomationInputSchema {
            schema_type: PROMPT_CONTEXT_AUTOMATION.to_string(),
            requires_prompt: self.requires_prompt,
            requires_context: self.requires_context,
            default_prompt_id: self.default_prompt_id.clone(),
            default_context_ids: self.default_context_ids.clone(),
        }
    }
}

/// Run lifecycle recorded by the automation fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRun {
    pub id: String,
    pub automation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub input_data: Option<Value>,
    #[serde(default)]
    pub output_data: Option<Value>,
    pub status: RunStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// What the user picked in the execution dialog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationExecutionData {
    pub automation_id: String,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub context_ids: Option<Vec<String>>,
    pub email_address: String,
    #[serde(default)]
    pub custom_prompt_content: Option<String>,
    /// Context id to (possibly edited) content
    #[serde(default)]
    pub custom_context_content: Option<BTreeMap<String, String>>,
}

impl AutomationExecutionData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("automation_id", &self.automation_id)?;
        validate_email(&self.email_address)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationPayloadItem {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Input data forwarded to the webhook for prompt/context automations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRunInputData {
    pub automation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<AutomationPayloadItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<AutomationPayloadItem>>,
    pub email_address: String,
    pub timestamp: DateTime<Utc>,
}

impl AutomationRunInputData {
    pub fn from_execution(data: &AutomationExecutionData, timestamp: DateTime<Utc>) -> Self {
        let prompt = data
            .custom_prompt_content
            .as_ref()
            .filter(|content| !content.is_empty())
            .map(|content| AutomationPayloadItem {
                id: data.prompt_id.clone().unwrap_or_else(|| "custom".to_string()),
                title: if data.prompt_id.is_some() {
                    "Selected Prompt".to_string()
                } else {
                    "Custom Prompt".to_string()
                },
                content: content.clone(),
            });

        // Blank entries are dropped; a non-empty map always yields a list.
        let contexts = data
            .custom_context_content
            .as_ref()
            .filter(|map| !map.is_empty())
            .map(|map| {
                map.iter()
                    .filter(|(_, content)| !content.trim().is_empty())
                    .map(|(id, content)| AutomationPayloadItem {
                        id: id.clone(),
                        title: format!("Context {}...", id.chars().take(8).collect::<String>()),
                        content: content.clone(),
                    })
                    .collect()
            });

        Self {
            automation_type: PROMPT_CONTEXT_RUN.to_string(),
            prompt,
            contexts,
            email_address: data.email_address.clone(),
            timestamp,
        }
    }
}

/// Response of the automation invocation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRunResult {
    pub success: bool,
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub duration: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution() -> AutomationExecutionData {
        AutomationExecutionData {
            automation_id: "auto-1".into(),
            email_address: "ops@example.com".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_input_custom_prompt_without_id() {
        let mut data = execution();
        data.custom_prompt_content = Some("Summarise this".into());
        let input = AutomationRunInputData::from_execution(&data, Utc::now());
        let prompt = input.prompt.unwrap();
        assert_eq!(prompt.id, "custom");
        assert_eq!(prompt.title, "Custom Prompt");
        assert!(input.contexts.is_none());
        assert_eq!(input.automation_type, PROMPT_CONTEXT_RUN);
    }

    #[test]
    fn test_run_input_selected_prompt_and_contexts() {
        let mut data = execution();
        data.prompt_id = Some("p-1".into());
        data.custom_prompt_content = Some("Template".into());
        let mut contexts = BTreeMap::new();
        contexts.insert("0123456789abcdef".to_string(), "Brand notes".to_string());
        contexts.insert("blank".to_string(), "   ".to_string());
        data.custom_context_content = Some(contexts);

        let input = AutomationRunInputData::from_execution(&data, Utc::now());
        assert_eq!(input.prompt.as_ref().unwrap().title, "Selected Prompt");
        let contexts = input.contexts.unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].title, "Context 01234567...");
    }

    #[test]
    fn test_run_result_wire_names() {
        let result: AutomationRunResult = serde_json::from_value(serde_json::json!({
            "success": true,
            "runId": "run-9",
            "status": "completed",
            "output": {"ok": true},
            "duration": 120
        }))
        .unwrap();
        assert_eq!(result.run_id, "run-9");
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.duration, Some(120));
    }

    #[test]
    fn test_enhanced_form_requires_valid_webhook() {
        let form = EnhancedAutomationFormData {
            name: "Weekly digest".into(),
            description: None,
            purpose: None,
            webhook_url: "not a url".into(),
            requires_prompt: true,
            requires_context: true,
            default_prompt_id: None,
            default_context_ids: None,
        };
        assert!(matches!(form.validate(), Err(ValidationError::InvalidUrl(_))));
        assert_eq!(form.input_schema().schema_type, PROMPT_CONTEXT_AUTOMATION);
    }
}
