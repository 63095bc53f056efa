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

//! Context suggestions from prompt usage history

use acelo_core::{Context, PromptUsageAnalytics};
use std::collections::{HashMap, HashSet};

/// Ranks context ids by how often they were used with a prompt
#[derive(Debug, Clone, Copy)]
pub struct SuggestionRanker {
    /// Only the most recent records for the prompt are counted
    pub history_limit: usize,
    pub max_suggestions: usize,
}

impl Default for SuggestionRanker {
    fn default() -> Self {
        Self {
            history_limit: 10,
            max_suggestions: 5,
        }
    }
}

impl SuggestionRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank context ids for `prompt_id`, most used first.
    ///
    /// Ties keep first-seen order, newest record first. Ids in `exclude` are
    /// dropped after counting.
    pub fn rank(
        &self,
        prompt_id: &str,
        records: &[PromptUsageAnalytics],
        exclude: &HashSet<String>,
    ) -> Vec<String> {
        let history = self.recent(prompt_id, records);

        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for id in history.iter().flat_map(|r| r.context_ids.iter()) {
            let count = counts.entry(id.as_str()).or_insert(0);
            if *count == 0 {
                order.push(id.as_str());
            }
            *count += 1;
        }

        // Vec::sort_by is stable
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));

        let ranked: Vec<String> = order
            .into_iter()
            .filter(|id| !exclude.contains(*id))
            .take(self.max_suggestions)
            .map(str::to_string)
            .collect();

        tracing::debug!(
            prompt_id = %prompt_id,
            history = history.len(),
            suggestions = ranked.len(),
            "Ranked context suggestions"
        );
        ranked
    }

    /// Whether the recent history of `prompt_id` references any context,
    /// selected or not
    pub fn has_history(&self, prompt_id: &str, records: &[PromptUsageAnalytics]) -> bool {
        self.recent(prompt_id, records)
            .iter()
            .any(|r| !r.context_ids.is_empty())
    }

    fn recent<'a>(
        &self,
        prompt_id: &str,
        records: &'a [PromptUsageAnalytics],
    ) -> Vec<&'a PromptUsageAnalytics> {
        let mut history: Vec<&PromptUsageAnalytics> =
            records.iter().filter(|r| r.prompt_id == prompt_id).collect();
        history.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        history.truncate(self.history_limit);
        history
    }
}

/// Number of contexts offered when there is no usage history
pub const FALLBACK_SUGGESTIONS: usize = 3;

/// Resolve ranked ids against the available contexts.
///
/// Without usage history this falls back to the first three available
/// contexts that are not already selected. With history only ranked ids are
/// offered, so a history whose contexts are all selected yields nothing.
/// Ranked ids that no longer exist are skipped.
pub fn suggested_contexts<'a>(
    available: &'a [Context],
    ranked_ids: &[String],
    has_history: bool,
    selected: &HashSet<String>,
) -> Vec<&'a Context> {
    if !has_history {
        return available
            .iter()
            .filter(|c| !selected.contains(&c.id))
            .take(FALLBACK_SUGGESTIONS)
            .collect();
    }

    ranked_ids
        .iter()
        .filter(|id| !selected.contains(*id))
        .filter_map(|id| available.iter().find(|c| &c.id == id))
        .collect()
}
