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

//! Final prompt composition
//!
//! The composed text has a fixed layout that exports depend on:
//!
//! ```text
//! <prompt content>
//!
//! --- CONTEXT ---
//!
//! 1. <title>:
//! <content>
//!
//! 2. Custom Context:
//! <custom context>
//! ```
//!
//! The context block is only appended when at least one context is selected
//! or the custom context is non-blank. Custom context is always numbered last.

use acelo_core::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

pub const CONTEXT_HEADER: &str = "--- CONTEXT ---";

const CUSTOM_CONTEXT_LABEL: &str = "Custom Context";

/// Compose a prompt template with its selected and custom context
pub fn compose(prompt_content: &str, selected_contexts: &[Context], custom_context: &str) -> String {
    compose_with(prompt_content, selected_contexts, custom_context, |c| c.title.clone())
}

/// Same layout as [`compose`], with each context title followed by its
/// category label (`1. Persona (Client/Customer Profiles):`)
pub fn compose_labelled(
    prompt_content: &str,
    selected_contexts: &[Context],
    custom_context: &str,
) -> String {
    compose_with(prompt_content, selected_contexts, custom_context, |c| {
        format!("{} ({})", c.title, c.category.label())
    })
}

fn compose_with<F>(
    prompt_content: &str,
    selected_contexts: &[Context],
    custom_context: &str,
    heading: F,
) -> String
where
    F: Fn(&Context) -> String,
{
    let has_custom = !custom_context.trim().is_empty();
    if selected_contexts.is_empty() && !has_custom {
        return prompt_content.to_string();
    }

    let mut combined = String::with_capacity(
        prompt_content.len()
            + custom_context.len()
            + selected_contexts
                .iter()
                .map(|c| c.title.len() + c.content.len() + 8)
                .sum::<usize>()
            + 32,
    );
    combined.push_str(prompt_content);
    combined.push_str("\n\n");
    combined.push_str(CONTEXT_HEADER);
    combined.push('\n');

    // Writing into a String cannot fail.
    for (index, context) in selected_contexts.iter().enumerate() {
        let _ = write!(combined, "\n{}. {}:\n{}\n", index + 1, heading(context), context.content);
    }

    if has_custom {
        let _ = write!(
            combined,
            "\n{}. {}:\n{}\n",
            selected_contexts.len() + 1,
            CUSTOM_CONTEXT_LABEL,
            custom_context
        );
    }

    combined
}

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("markdown rule is a valid pattern"),
        replacement,
    }
}

// Applied in order. Inline code runs before fenced blocks, so fences are
// usually only partly stripped.
static MARKDOWN_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"#{1,6}\s+", ""),
        rule(r"\*\*([^*]+)\*\*", "$1"),
        rule(r"\*([^*]+)\*", "$1"),
        rule(r"`([^`]+)`", "$1"),
        rule(r"```[\s\S]*?```", "[code block]"),
        rule(r"\[([^\]]+)\]\([^)]+\)", "$1"),
        rule(r"(?m)^\s*[-*+]\s+", "• "),
        rule(r"(?m)^\s*\d+\.\s+", "• "),
    ]
});

/// Best-effort markdown to plain text for clipboard and export.
///
/// This is a fixed sequence of regex rewrites, not a markdown parser.
/// Nested or unusual markdown may survive partially.
pub fn to_plain_text(markdown: &str) -> String {
    let mut text = markdown.to_string();
    for rule in MARKDOWN_RULES.iter() {
        text = rule
            .pattern
            .replace_all(&text, rule.replacement)
            .into_owned();
    }
    text.trim().to_string()
}
