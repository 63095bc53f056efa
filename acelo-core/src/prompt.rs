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

//! Stored prompt templates

use crate::error::ValidationError;
use crate::validation::require;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prompt template row
///
/// The template text lives in `prompt_content` on the backend; older rows
/// only carry `name`, so [`Prompt::display_title`] falls back through both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default, rename = "prompt_content")]
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_version: Option<u32>,
    #[serde(default)]
    pub estimated_tokens: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Prompt {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            name: None,
            title: Some(title.into()),
            description: None,
            category: None,
            purpose: None,
            content: content.into(),
            status: None,
            current_version: None,
            estimated_tokens: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Untitled Prompt")
    }
}

/// One immutable revision of a prompt's template text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: String,
    pub prompt_id: String,
    pub title: String,
    pub content: String,
    pub version_number: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptFormData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub title: String,
    pub content: String,
}

impl PromptFormData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("title", &self.title)?;
        require("content", &self.content)?;
        Ok(())
    }
}
