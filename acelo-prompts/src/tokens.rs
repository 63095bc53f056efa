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

//! Token estimation
//!
//! Four characters are counted as one token. This is the usual rough
//! approximation for English text, not a real tokenizer count.

use acelo_core::Context;
use serde::{Deserialize, Serialize};

pub const CHARS_PER_TOKEN: u64 = 4;

/// Approximate USD cost per 1K tokens
pub const COST_PER_1K_TOKENS: f64 = 0.0015;

/// Generation is disabled above this many tokens
pub const MAX_TOKENS: u64 = 4_000;

/// The estimate is flagged from this many tokens on
pub const WARNING_TOKENS: u64 = 3_500;

/// Derived token/cost figures for a composed prompt
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEstimate {
    pub prompt_tokens: u64,
    pub context_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Ok,
    Warning,
    OverLimit,
}

impl TokenEstimate {
    pub fn is_within_limits(&self) -> bool {
        self.total_tokens <= MAX_TOKENS
    }

    pub fn is_warning(&self) -> bool {
        self.total_tokens >= WARNING_TOKENS
    }

    pub fn status(&self) -> TokenStatus {
        if !self.is_within_limits() {
            TokenStatus::OverLimit
        } else if self.is_warning() {
            TokenStatus::Warning
        } else {
            TokenStatus::Ok
        }
    }

    /// Share of the hard limit used, capped at 100
    pub fn usage_percent(&self) -> f64 {
        (self.total_tokens as f64 / MAX_TOKENS as f64 * 100.0).min(100.0)
    }
}

/// Approximate token count for a piece of text
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the cost of a prompt plus its selected and custom context
pub fn estimate(prompt_text: &str, selected_contexts: &[Context], custom_context: &str) -> TokenEstimate {
    let prompt_tokens = estimate_tokens(prompt_text);

    let selected_tokens: u64 = selected_contexts
        .iter()
        .map(|context| estimate_tokens(&context.content))
        .sum();
    let context_tokens = selected_tokens + estimate_tokens(custom_context);

    let total_tokens = prompt_tokens + context_tokens;

    TokenEstimate {
        prompt_tokens,
        context_tokens,
        total_tokens,
        estimated_cost: total_tokens as f64 / 1000.0 * COST_PER_1K_TOKENS,
    }
}
