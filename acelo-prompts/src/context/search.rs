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

use acelo_core::{Context, ContextCategory};
use serde::Serialize;

/// Browse list after filtering
#[derive(Debug, Clone)]
pub struct SearchResults<'a> {
    pub contexts: Vec<&'a Context>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub total: usize,
    pub filtered: usize,
    pub has_active_filters: bool,
}

/// Filter a browse list by category and search term.
///
/// The category is an exact match. The term is trimmed and matched
/// case-insensitively as a substring of title, description or content.
/// Both filters must pass.
pub fn filter_contexts<'a>(
    contexts: &'a [Context],
    search_term: &str,
    category: Option<ContextCategory>,
) -> SearchResults<'a> {
    let needle = search_term.trim().to_lowercase();

    let filtered: Vec<&Context> = contexts
        .iter()
        .filter(|context| category.map_or(true, |c| context.category == c))
        .filter(|context| needle.is_empty() || matches_term(context, &needle))
        .collect();

    SearchResults {
        stats: SearchStats {
            total: contexts.len(),
            filtered: filtered.len(),
            has_active_filters: category.is_some() || !needle.is_empty(),
        },
        contexts: filtered,
    }
}

fn matches_term(context: &Context, needle: &str) -> bool {
    context.title.to_lowercase().contains(needle)
        || context
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || context.content.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Vec<Context> {
        vec![
            Context::new("1", "Acme persona", ContextCategory::ClientProfiles, "CTO at a startup"),
            Context::new("2", "Pricing sheet", ContextCategory::ProductServiceInfo, "Gold tier")
                .with_description("Plans for ACME"),
            Context::new("3", "Tone", ContextCategory::BrandVoiceGuidelines, "Warm and direct"),
        ]
    }

    #[test]
    fn test_no_filters_returns_all() {
        let contexts = library();
        let results = filter_contexts(&contexts, "   ", None);
        assert_eq!(results.contexts.len(), 3);
        assert!(!results.stats.has_active_filters);
    }

    #[test]
    fn test_term_matches_title_description_content_case_insensitive() {
        let contexts = library();
        let results = filter_contexts(&contexts, " acme ", None);
        let ids: Vec<&str> = results.contexts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let results = filter_contexts(&contexts, "WARM", None);
        assert_eq!(results.contexts[0].id, "3");
    }

    #[test]
    fn test_category_and_term_combine_with_and() {
        let contexts = library();
        let results = filter_contexts(&contexts, "acme", Some(ContextCategory::ProductServiceInfo));
        assert_eq!(results.contexts.len(), 1);
        assert_eq!(results.contexts[0].id, "2");
        assert_eq!(
            results.stats,
            SearchStats { total: 3, filtered: 1, has_active_filters: true }
        );

        let results = filter_contexts(&contexts, "warm", Some(ContextCategory::ClientProfiles));
        assert!(results.contexts.is_empty());
    }
}
