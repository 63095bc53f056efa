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

use crate::context::search::{filter_contexts, SearchResults};
use crate::{PromptError, Result};
use acelo_core::{Context, ContextCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// In-memory selection for one workflow session
///
/// `selected_contexts` holds no duplicate ids; its order is both the display
/// order and the order used when composing the final prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSelectionState {
    selected_contexts: Vec<Context>,
    custom_context: String,
    search_term: String,
    selected_category: Option<ContextCategory>,
}

impl ContextSelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_contexts(&self) -> &[Context] {
        &self.selected_contexts
    }

    pub fn custom_context(&self) -> &str {
        &self.custom_context
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn selected_category(&self) -> Option<ContextCategory> {
        self.selected_category
    }

    pub fn len(&self) -> usize {
        self.selected_contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_contexts.is_empty()
    }

    pub fn contains(&self, context_id: &str) -> bool {
        self.selected_contexts.iter().any(|c| c.id == context_id)
    }

    pub fn context_ids(&self) -> Vec<String> {
        self.selected_contexts.iter().map(|c| c.id.clone()).collect()
    }

    /// Append a context; selecting an id twice is a no-op.
    ///
    /// Returns whether the context was added.
    pub fn select(&mut self, context: Context) -> bool {
        if self.contains(&context.id) {
            tracing::debug!(context_id = %context.id, "context already selected");
            return false;
        }
        self.selected_contexts.push(context);
        true
    }

    /// Remove a context by id; unknown ids are ignored.
    pub fn deselect(&mut self, context_id: &str) -> bool {
        let before = self.selected_contexts.len();
        self.selected_contexts.retain(|c| c.id != context_id);
        before != self.selected_contexts.len()
    }

    /// Replace the selection with a caller-supplied ordering.
    ///
    /// The new list must contain exactly the currently selected ids, each
    /// once. Anything else is rejected and the selection is left untouched.
    pub fn reorder(&mut self, reordered: Vec<Context>) -> Result<()> {
        if reordered.len() != self.selected_contexts.len() {
            let reason = format!(
                "expected {} contexts, got {}",
                self.selected_contexts.len(),
                reordered.len()
            );
            tracing::warn!("Rejected context reorder: {}", reason);
            return Err(PromptError::InvalidReorder(reason));
        }

        let current: HashSet<&str> = self.selected_contexts.iter().map(|c| c.id.as_str()).collect();
        let mut seen = HashSet::with_capacity(reordered.len());
        for context in &reordered {
            if !current.contains(context.id.as_str()) {
                let reason = format!("context {} is not selected", context.id);
                tracing::warn!("Rejected context reorder: {}", reason);
                return Err(PromptError::InvalidReorder(reason));
            }
            if !seen.insert(context.id.as_str()) {
                let reason = format!("context {} appears more than once", context.id);
                tracing::warn!("Rejected context reorder: {}", reason);
                return Err(PromptError::InvalidReorder(reason));
            }
        }

        self.selected_contexts = reordered;
        Ok(())
    }

    /// Move one selected context from `from` to `to` (drag and drop)
    pub fn move_context(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.selected_contexts.len();
        for index in [from, to] {
            if index >= len {
                return Err(PromptError::IndexOutOfRange { index, len });
            }
        }
        if from != to {
            let item = self.selected_contexts.remove(from);
            self.selected_contexts.insert(to, item);
        }
        Ok(())
    }

    /// Stored verbatim: no trimming and no length cap.
    pub fn set_custom_context(&mut self, text: impl Into<String>) {
        self.custom_context = text.into();
    }

    pub fn has_custom_context(&self) -> bool {
        !self.custom_context.trim().is_empty()
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn set_category(&mut self, category: Option<ContextCategory>) {
        self.selected_category = category;
    }

    /// Apply the current search term and category to a browse list
    pub fn browse<'a>(&self, contexts: &'a [Context]) -> SearchResults<'a> {
        filter_contexts(contexts, &self.search_term, self.selected_category)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
