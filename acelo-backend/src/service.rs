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

//! Typed access to everything a signed-in user owns
//!
//! Every operation is scoped to the session user and fails with
//! [`BackendError::Unauthenticated`] before any request when there is none.

use crate::analytics::{usage_history, StoreUsageRecorder};
use crate::automation::AutomationRunner;
use crate::cache::CachedStore;
use crate::error::{BackendError, Result};
use crate::functions::FunctionsClient;
use crate::session::{require_user, Session};
use crate::storage::{HttpObjectStorage, ObjectStorage};
use crate::store::{Collection, DataStore, Query, RestDataStore};
use acelo_core::automation::{
    AutomationExecutionData, AutomationFormData, AutomationRunInputData,
    EnhancedAutomationFormData,
};
use acelo_core::{
    AceloConfig, AssetFile, Automation, AutomationRun, Coach, CoachFormData, Context,
    ContextCategory, ContextFormData, DashboardStats, Prompt, PromptFormData, PromptUsageAnalytics,
    PromptVersion,
};
use acelo_prompts::{
    filter_contexts, suggested_contexts, SuggestionRanker, TextGenerator,
    UsageAnalyticsDispatcher, WorkflowSession,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn decode<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| Ok(serde_json::from_value(row)?))
        .collect()
}

fn first<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<T> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(what.to_string()))?;
    Ok(serde_json::from_value(row)?)
}

pub struct Acelo {
    config: AceloConfig,
    session: Option<Session>,
    store: Arc<dyn DataStore>,
    storage: Arc<dyn ObjectStorage>,
    generator: Arc<dyn TextGenerator>,
    automations: Arc<dyn AutomationRunner>,
    ranker: SuggestionRanker,
}

impl Acelo {
    /// Wire HTTP collaborators for `session`
    pub fn connect(config: AceloConfig, session: Option<Session>) -> Self {
        let token = session.as_ref().map(|s| s.access_token.clone());

        let mut rest = RestDataStore::new(&config.backend);
        let mut storage = HttpObjectStorage::new(&config.backend, &config.storage);
        let mut functions = FunctionsClient::new(&config.backend, &config.functions);
        if let Some(token) = token {
            rest = rest.with_access_token(token.clone());
            storage = storage.with_access_token(token.clone());
            functions = functions.with_access_token(token);
        }

        let rest: Arc<dyn DataStore> = Arc::new(rest);
        let store: Arc<dyn DataStore> = if config.cache.enabled {
            Arc::new(CachedStore::new(rest, &config.cache))
        } else {
            rest
        };
        let functions = Arc::new(functions);

        Self::with_parts(
            config,
            session,
            store,
            Arc::new(storage),
            functions.clone(),
            functions,
        )
    }

    pub fn with_parts(
        config: AceloConfig,
        session: Option<Session>,
        store: Arc<dyn DataStore>,
        storage: Arc<dyn ObjectStorage>,
        generator: Arc<dyn TextGenerator>,
        automations: Arc<dyn AutomationRunner>,
    ) -> Self {
        Self {
            config,
            session,
            store,
            storage,
            generator,
            automations,
            ranker: SuggestionRanker::default(),
        }
    }

    pub fn config(&self) -> &AceloConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Result<&str> {
        require_user(self.session.as_ref())
    }

    pub fn store(&self) -> Arc<dyn DataStore> {
        Arc::clone(&self.store)
    }

    pub fn generator(&self) -> Arc<dyn TextGenerator> {
        Arc::clone(&self.generator)
    }

    fn scoped(&self, collection: Collection) -> Result<Query> {
        Ok(Query::new(collection).eq("user_id", self.user_id()?))
    }

    fn by_id(&self, collection: Collection, id: &str) -> Result<Query> {
        Ok(self.scoped(collection)?.eq("id", id))
    }

    // Contexts

    /// Contexts newest first, optionally narrowed by category and search term
    pub async fn list_contexts(
        &self,
        category: Option<ContextCategory>,
        search_term: Option<&str>,
    ) -> Result<Vec<Context>> {
        let mut query = self.scoped(Collection::Contexts)?.newest_first();
        if let Some(category) = category {
            query = query.eq("category", category.as_str());
        }
        let contexts: Vec<Context> = decode(self.store.select(&query).await?)?;

        match search_term {
            Some(term) if !term.trim().is_empty() => Ok(filter_contexts(&contexts, term, None)
                .contexts
                .into_iter()
                .cloned()
                .collect()),
            _ => Ok(contexts),
        }
    }

    pub async fn get_context(&self, id: &str) -> Result<Context> {
        let rows = self.store.select(&self.by_id(Collection::Contexts, id)?).await?;
        first(rows, &format!("context {}", id))
    }

    /// Resolve ids to contexts, keeping the given order
    pub async fn contexts_by_ids(&self, ids: &[String]) -> Result<Vec<Context>> {
        let all = self.list_contexts(None, None).await?;
        ids.iter()
            .map(|id| {
                all.iter()
                    .find(|c| &c.id == id)
                    .cloned()
                    .ok_or_else(|| BackendError::NotFound(format!("context {}", id)))
            })
            .collect()
    }

    pub async fn create_context(&self, form: &ContextFormData) -> Result<Context> {
        form.validate()?;
        let mut row = serde_json::to_value(form)?;
        row["user_id"] = json!(self.user_id()?);
        let row = self.store.insert(Collection::Contexts, row).await?;
        tracing::info!(context_id = ?row.get("id"), "Created context");
        Ok(serde_json::from_value(row)?)
    }

    pub async fn update_context(&self, id: &str, form: &ContextFormData) -> Result<Context> {
        form.validate()?;
        let patch = json!({
            "title": form.title,
            "description": form.description,
            "category": form.category,
            "content": form.content,
        });
        let rows = self
            .store
            .update(&self.by_id(Collection::Contexts, id)?, patch)
            .await?;
        first(rows, &format!("context {}", id))
    }

    pub async fn delete_context(&self, id: &str) -> Result<()> {
        self.store.delete(&self.by_id(Collection::Contexts, id)?).await
    }

    // Prompts

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        let query = self.scoped(Collection::Prompts)?.newest_first();
        decode(self.store.select(&query).await?)
    }

    pub async fn get_prompt(&self, id: &str) -> Result<Prompt> {
        let rows = self.store.select(&self.by_id(Collection::Prompts, id)?).await?;
        first(rows, &format!("prompt {}", id))
    }

    /// Insert the prompt at version 1, then its first version row
    pub async fn create_prompt(&self, form: &PromptFormData) -> Result<(Prompt, PromptVersion)> {
        form.validate()?;
        let user_id = self.user_id()?;

        let prompt = self
            .store
            .insert(
                Collection::Prompts,
                json!({
                    "user_id": user_id,
                    "name": form.name,
                    "title": form.title,
                    "description": form.description,
                    "category": form.category,
                    "prompt_content": form.content,
                    "current_version": 1,
                }),
            )
            .await?;
        let prompt: Prompt = serde_json::from_value(prompt)?;

        let version = self
            .store
            .insert(
                Collection::PromptVersions,
                json!({
                    "prompt_id": prompt.id,
                    "user_id": user_id,
                    "title": form.title,
                    "content": form.content,
                    "version_number": 1,
                }),
            )
            .await?;

        tracing::info!(prompt_id = %prompt.id, "Created prompt");
        Ok((prompt, serde_json::from_value(version)?))
    }

    /// Versions of a prompt, latest first
    pub async fn prompt_versions(&self, prompt_id: &str) -> Result<Vec<PromptVersion>> {
        let query = self
            .scoped(Collection::PromptVersions)?
            .eq("prompt_id", prompt_id)
            .order_by("version_number", false);
        decode(self.store.select(&query).await?)
    }

    pub async fn delete_prompt(&self, id: &str) -> Result<()> {
        self.store.delete(&self.by_id(Collection::Prompts, id)?).await
    }

    /// A fresh workflow session for a stored prompt
    pub async fn start_workflow(&self, prompt_id: &str) -> Result<WorkflowSession> {
        Ok(WorkflowSession::new(self.get_prompt(prompt_id).await?))
    }

    // Usage analytics and suggestions

    pub fn analytics_dispatcher(&self) -> Result<UsageAnalyticsDispatcher> {
        let recorder = StoreUsageRecorder::new(self.store(), self.user_id()?);
        Ok(UsageAnalyticsDispatcher::new(Arc::new(recorder)))
    }

    pub async fn usage_history(&self, prompt_id: &str) -> Result<Vec<PromptUsageAnalytics>> {
        usage_history(
            self.store.as_ref(),
            self.user_id()?,
            prompt_id,
            self.ranker.history_limit,
        )
        .await
    }

    /// Contexts to offer for a prompt, given what is already selected
    pub async fn suggest_contexts(
        &self,
        prompt_id: &str,
        selected: &HashSet<String>,
    ) -> Result<Vec<Context>> {
        let history = self.usage_history(prompt_id).await?;
        let ranked = self.ranker.rank(prompt_id, &history, selected);
        let has_history = self.ranker.has_history(prompt_id, &history);
        let available = self.list_contexts(None, None).await?;
        Ok(suggested_contexts(&available, &ranked, has_history, selected)
            .into_iter()
            .cloned()
            .collect())
    }

    // Automations

    pub async fn list_automations(&self) -> Result<Vec<Automation>> {
        let query = self.scoped(Collection::Automations)?.newest_first();
        decode(self.store.select(&query).await?)
    }

    pub async fn get_automation(&self, id: &str) -> Result<Automation> {
        let rows = self
            .store
            .select(&self.by_id(Collection::Automations, id)?)
            .await?;
        first(rows, &format!("automation {}", id))
    }

    pub async fn create_automation(&self, form: &AutomationFormData) -> Result<Automation> {
        form.validate()?;
        let mut row = serde_json::to_value(form)?;
        row["user_id"] = json!(self.user_id()?);
        let row = self.store.insert(Collection::Automations, row).await?;
        Ok(serde_json::from_value(row)?)
    }

    /// Prompt/context automations are created active
    pub async fn create_enhanced_automation(
        &self,
        form: &EnhancedAutomationFormData,
    ) -> Result<Automation> {
        form.validate()?;
        let row = json!({
            "user_id": self.user_id()?,
            "name": form.name,
            "description": form.description,
            "purpose": form.purpose,
            "webhook_url": form.webhook_url,
            "input_schema": form.input_schema(),
            "active": true,
        });
        let row = self.store.insert(Collection::Automations, row).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn set_automation_active(&self, id: &str, active: bool) -> Result<Automation> {
        let rows = self
            .store
            .update(
                &self.by_id(Collection::Automations, id)?,
                json!({ "active": active }),
            )
            .await?;
        first(rows, &format!("automation {}", id))
    }

    pub async fn delete_automation(&self, id: &str) -> Result<()> {
        self.store
            .delete(&self.by_id(Collection::Automations, id)?)
            .await
    }

    /// Run history newest first, optionally for one automation
    pub async fn automation_runs(
        &self,
        automation_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AutomationRun>> {
        let mut query = self.scoped(Collection::AutomationRuns)?.newest_first().limit(limit);
        if let Some(automation_id) = automation_id {
            query = query.eq("automation_id", automation_id);
        }
        decode(self.store.select(&query).await?)
    }

    pub async fn run_automation(
        &self,
        automation_id: &str,
        input_data: Value,
    ) -> Result<acelo_core::AutomationRunResult> {
        let user_id = self.user_id()?;
        let result = self.automations.run(user_id, automation_id, input_data).await;
        // The run row may have been written by the backend, outside this store.
        self.store
            .invalidate(Collection::AutomationRuns, Some(user_id))
            .await;
        result
    }

    /// Validate the execution dialog input and run with the prompt/context payload
    pub async fn run_enhanced_automation(
        &self,
        execution: &AutomationExecutionData,
    ) -> Result<acelo_core::AutomationRunResult> {
        execution.validate()?;
        let input = AutomationRunInputData::from_execution(execution, Utc::now());
        self.run_automation(&execution.automation_id, serde_json::to_value(input)?)
            .await
    }

    // Coaches

    pub async fn list_coaches(&self) -> Result<Vec<Coach>> {
        let query = self.scoped(Collection::Coaches)?.newest_first();
        decode(self.store.select(&query).await?)
    }

    pub async fn create_coach(&self, form: &CoachFormData) -> Result<Coach> {
        form.validate()?;
        let mut row = serde_json::to_value(form)?;
        row["user_id"] = json!(self.user_id()?);
        let row = self.store.insert(Collection::Coaches, row).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete_coach(&self, id: &str) -> Result<()> {
        self.store.delete(&self.by_id(Collection::Coaches, id)?).await
    }

    // Assets

    pub async fn list_assets(&self) -> Result<Vec<AssetFile>> {
        self.storage.list(self.user_id()?).await
    }

    pub async fn upload_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        self.storage
            .upload(self.user_id()?, file_name, bytes, content_type)
            .await
    }

    pub async fn remove_assets(&self, file_names: &[String]) -> Result<()> {
        self.storage.remove(self.user_id()?, file_names).await
    }

    pub async fn asset_url(&self, file_name: &str) -> Result<String> {
        self.storage
            .create_signed_url(
                self.user_id()?,
                file_name,
                self.config.storage.signed_url_expiry_secs,
            )
            .await
    }

    // Dashboard

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let user_id = self.user_id()?;
        let prompts = self.scoped(Collection::Prompts)?;
        let automations = self.scoped(Collection::Automations)?;
        let coaches = self.scoped(Collection::Coaches)?;
        let contexts = self.scoped(Collection::Contexts)?;
        let active = self.scoped(Collection::Automations)?.eq("active", true);

        let (assets, prompts, automations, coaches, contexts, active_automations) = tokio::try_join!(
            self.storage.list(user_id),
            self.store.count(&prompts),
            self.store.count(&automations),
            self.store.count(&coaches),
            self.store.count(&contexts),
            self.store.count(&active),
        )?;

        Ok(DashboardStats {
            total_assets: assets.len() as u64,
            total_prompts: prompts,
            total_automations: automations,
            total_coaches: coaches,
            total_contexts: contexts,
            active_automations,
        })
    }
}
