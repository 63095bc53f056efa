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

//! Form validation helpers

use crate::automation::{AutomationInputSchema, PROMPT_CONTEXT_AUTOMATION};
use crate::error::{Result, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Reject a missing or whitespace-only field
pub fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Same as [`require`] for optional form fields
pub fn require_some(field: &'static str, value: Option<&str>) -> Result<()> {
    require(field, value.unwrap_or_default())
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    if !EMAIL_PATTERN.is_match(email.trim()) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// Webhook URLs must be absolute http(s) URLs
pub fn validate_webhook_url(raw: &str) -> Result<url::Url> {
    require("webhook_url", raw)?;
    let parsed =
        url::Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidUrl(format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ValidationError::InvalidUrl(format!(
            "{raw}: unsupported scheme {other}"
        ))),
    }
}

/// Parse an automation input schema from its JSON text
pub fn parse_input_schema(raw: &str) -> Result<AutomationInputSchema> {
    let schema: AutomationInputSchema =
        serde_json::from_str(raw).map_err(|e| ValidationError::InvalidSchema(e.to_string()))?;
    if schema.schema_type != PROMPT_CONTEXT_AUTOMATION {
        return Err(ValidationError::InvalidSchema(format!(
            "unexpected schema type {}",
            schema.schema_type
        )));
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert!(require("title", "Hello").is_ok());
        assert_eq!(require("title", ""), Err(ValidationError::MissingField("title")));
        assert_eq!(require_some("name", None), Err(ValidationError::MissingField("name")));
    }

    #[test]
    fn test_email() {
        assert!(validate_email("jo@example.com").is_ok());
        assert!(matches!(
            validate_email("not-an-email"),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert!(matches!(
            validate_email("a b@example.com"),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert_eq!(validate_email(" "), Err(ValidationError::MissingField("email")));
    }

    #[test]
    fn test_webhook_url() {
        assert!(validate_webhook_url("https://n8n.example.com/webhook/abc").is_ok());
        assert!(matches!(
            validate_webhook_url("ftp://example.com/hook"),
            Err(ValidationError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_webhook_url("/relative/path"),
            Err(ValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_input_schema() {
        let ok = r#"{"type":"prompt_context_automation","requires_prompt":true,"requires_context":false}"#;
        let schema = parse_input_schema(ok).unwrap();
        assert!(schema.requires_prompt);
        assert!(!schema.requires_context);

        let wrong_type = r#"{"type":"other","requires_prompt":true,"requires_context":false}"#;
        assert!(matches!(
            parse_input_schema(wrong_type),
            Err(ValidationError::InvalidSchema(_))
        ));
        assert!(matches!(
            parse_input_schema("{not json"),
            Err(ValidationError::InvalidSchema(_))
        ));
    }
}
