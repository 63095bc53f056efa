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

//! Context documents
//!
//! A context is a reusable, user-authored text document filed under one of
//! ten fixed categories. Workflows reference contexts by id and never mutate
//! the copy they hold.

use crate::error::ValidationError;
use crate::validation::require;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed context domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextCategory {
    ClientProfiles,
    ProductServiceInfo,
    CompetitorAnalysis,
    IndustryKnowledge,
    BrandVoiceGuidelines,
    TechnicalDocumentation,
    CreativeFrameworks,
    CommunicationTemplates,
    ProcessDocumentation,
    MarketResearch,
}

impl ContextCategory {
    pub const ALL: [ContextCategory; 10] = [
        ContextCategory::ClientProfiles,
        ContextCategory::ProductServiceInfo,
        ContextCategory::CompetitorAnalysis,
        ContextCategory::IndustryKnowledge,
        ContextCategory::BrandVoiceGuidelines,
        ContextCategory::TechnicalDocumentation,
        ContextCategory::CreativeFrameworks,
        ContextCategory::CommunicationTemplates,
        ContextCategory::ProcessDocumentation,
        ContextCategory::MarketResearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextCategory::ClientProfiles => "client_profiles",
            ContextCategory::ProductServiceInfo => "product_service_info",
            ContextCategory::CompetitorAnalysis => "competitor_analysis",
            ContextCategory::IndustryKnowledge => "industry_knowledge",
            ContextCategory::BrandVoiceGuidelines => "brand_voice_guidelines",
            ContextCategory::TechnicalDocumentation => "technical_documentation",
            ContextCategory::CreativeFrameworks => "creative_frameworks",
            ContextCategory::CommunicationTemplates => "communication_templates",
            ContextCategory::ProcessDocumentation => "process_documentation",
            ContextCategory::MarketResearch => "market_research",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            ContextCategory::ClientProfiles => "Client/Customer Profiles",
            ContextCategory::ProductServiceInfo => "Product/Service Info",
            ContextCategory::CompetitorAnalysis => "Competitor Analysis",
            ContextCategory::IndustryKnowledge => "Industry Knowledge",
            ContextCategory::BrandVoiceGuidelines => "Brand Voice & Guidelines",
            ContextCategory::TechnicalDocumentation => "Technical Documentation",
            ContextCategory::CreativeFrameworks => "Creative Frameworks",
            ContextCategory::CommunicationTemplates => "Communication Templates",
            ContextCategory::ProcessDocumentation => "Process Documentation",
            ContextCategory::MarketResearch => "Market Research",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ContextCategory::ClientProfiles => "Customer segments and personas",
            ContextCategory::ProductServiceInfo => "Detailed product descriptions",
            ContextCategory::CompetitorAnalysis => "Market positioning information",
            ContextCategory::IndustryKnowledge => "Sector-specific information",
            ContextCategory::BrandVoiceGuidelines => "Communication styles",
            ContextCategory::TechnicalDocumentation => "Specifications and constraints",
            ContextCategory::CreativeFrameworks => "Writing guides and structures",
            ContextCategory::CommunicationTemplates => "Email and meeting formats",
            ContextCategory::ProcessDocumentation => "Workflows and procedures",
            ContextCategory::MarketResearch => "Industry insights and data",
        }
    }
}

impl fmt::Display for ContextCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        ContextCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// A stored context document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: ContextCategory,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Context {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: ContextCategory,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            title: title.into(),
            description: None,
            category,
            content: content.into(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// First `max_chars` characters of the content, used for list previews
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.content.chars().take(max_chars).collect();
        if self.content.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Fields accepted by the create/update context form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFormData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: ContextCategory,
    pub content: String,
}

impl ContextFormData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in ContextCategory::ALL {
            let parsed: ContextCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = "sales".parse::<ContextCategory>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownCategory("sales".into()));
    }

    #[test]
    fn test_context_deserializes_backend_row() {
        let row = serde_json::json!({
            "id": "ctx-1",
            "user_id": "user-1",
            "title": "Brand voice",
            "description": null,
            "category": "brand_voice_guidelines",
            "content": "Friendly, concise.",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        });
        let ctx: Context = serde_json::from_value(row).unwrap();
        assert_eq!(ctx.category, ContextCategory::BrandVoiceGuidelines);
        assert!(ctx.description.is_none());
        assert!(ctx.created_at.is_some());
    }

    #[test]
    fn test_preview_truncates() {
        let ctx = Context::new("1", "t", ContextCategory::MarketResearch, "abcdefghij");
        assert_eq!(ctx.preview(4), "abcd...");
        assert_eq!(ctx.preview(20), "abcdefghij");
    }

    #[test]
    fn test_form_requires_title() {
        let form = ContextFormData {
            title: "  ".into(),
            description: None,
            category: ContextCategory::MarketResearch,
            content: "body".into(),
        };
        assert_eq!(form.validate(), Err(ValidationError::MissingField("title")));
    }
}
