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

//! Row store over the backend collections
//!
//! Rows are JSON objects. Queries support equality filters, a single order
//! column and a limit; there is no other query language.

use crate::error::{check_response, BackendError, Result};
use acelo_core::config::BackendConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Prompts,
    PromptVersions,
    Contexts,
    Automations,
    AutomationRuns,
    Coaches,
    PromptUsageAnalytics,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Prompts => "prompts",
            Collection::PromptVersions => "prompt_versions",
            Collection::Contexts => "contexts",
            Collection::Automations => "automations",
            Collection::AutomationRuns => "automation_runs",
            Collection::Coaches => "coaches",
            Collection::PromptUsageAnalytics => "prompt_usage_analytics",
        }
    }

    /// Column stamped on insert when the row does not carry it
    fn timestamp_column(&self) -> &'static str {
        match self {
            Collection::PromptUsageAnalytics => "generated_at",
            _ => "created_at",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Equality-filtered query over one collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<(String, String)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((column.into(), value.to_string()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Newest first by `created_at`
    pub fn newest_first(self) -> Self {
        self.order_by("created_at", false)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.filter("user_id")
    }

    /// PostgREST query string parameters
    fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for (column, value) in &self.filters {
            params.push((column.clone(), format!("eq.{}", value)));
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).is_some_and(|v| value_matches(v, expected)))
    }
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Null => expected == "null",
        other => other.to_string() == expected,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

/// CRUD over backend collections
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Insert one row and return it as stored
    async fn insert(&self, collection: Collection, row: Value) -> Result<Value>;

    /// Merge `patch` into every matching row and return the updated rows
    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>>;

    async fn delete(&self, query: &Query) -> Result<()>;

    async fn count(&self, query: &Query) -> Result<u64>;

    /// Forget cached reads of `collection`; a no-op for uncached stores
    async fn invalidate(&self, _collection: Collection, _user_id: Option<&str>) {}
}

/// PostgREST-style HTTP data store
pub struct RestDataStore {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl RestDataStore {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send the user's token instead of the anon key as bearer
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn request(&self, method: reqwest::Method, collection: Collection) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, collection.table()))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }
}

#[async_trait]
impl DataStore for RestDataStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::GET, query.collection)
            .query(&query.to_params())
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, collection)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Value> = check_response(response).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| BackendError::Api {
            status: 500,
            message: format!("insert into {} returned no row", collection),
        })
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let params: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|(c, v)| (c.clone(), format!("eq.{}", v)))
            .collect();
        let response = self
            .request(reqwest::Method::PATCH, query.collection)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn delete(&self, query: &Query) -> Result<()> {
        let params: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|(c, v)| (c.clone(), format!("eq.{}", v)))
            .collect();
        let response = self
            .request(reqwest::Method::DELETE, query.collection)
            .query(&params)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let mut params: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|(c, v)| (c.clone(), format!("eq.{}", v)))
            .collect();
        params.push(("select".to_string(), "id".to_string()));

        let response = self
            .request(reqwest::Method::GET, query.collection)
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;
        let response = check_response(response).await?;

        // Content-Range: 0-9/42 or */0
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok());

        match total {
            Some(total) => Ok(total),
            None => {
                let rows: Vec<Value> = response.json().await?;
                Ok(rows.len() as u64)
            }
        }
    }
}

/// In-process store with the same filter semantics as the REST store
#[derive(Default)]
pub struct InMemoryDataStore {
    rows: RwLock<HashMap<Collection, Vec<Value>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select_sync(&self, query: &Query) -> Vec<Value> {
        let rows = self.rows.read();
        let mut matched: Vec<Value> = rows
            .get(&query.collection)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn as_object(row: Value) -> Result<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Api {
            status: 400,
            message: format!("expected a JSON object row, got {}", other),
        }),
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        Ok(self.select_sync(query))
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value> {
        let mut row = as_object(row)?;
        let now = Value::String(Utc::now().to_rfc3339());
        row.entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        row.entry(collection.timestamp_column())
            .or_insert_with(|| now.clone());
        if collection != Collection::PromptUsageAnalytics {
            row.entry("updated_at").or_insert(now);
        }

        let row = Value::Object(row);
        self.rows
            .write()
            .entry(collection)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let patch = as_object(patch)?;
        let now = Value::String(Utc::now().to_rfc3339());
        let mut updated = Vec::new();

        let mut rows = self.rows.write();
        for row in rows.entry(query.collection).or_default().iter_mut() {
            if !query.matches(row) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
                if query.collection != Collection::PromptUsageAnalytics {
                    fields.insert("updated_at".to_string(), now.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<()> {
        if let Some(rows) = self.rows.write().get_mut(&query.collection) {
            rows.retain(|row| !query.matches(row));
        }
        Ok(())
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let mut unlimited = query.clone();
        unlimited.limit = None;
        Ok(self.select_sync(&unlimited).len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_filters_and_order() {
        let store = InMemoryDataStore::new();
        for (id, user, at) in [
            ("a", "u1", "2024-01-01T00:00:00Z"),
            ("b", "u1", "2024-01-03T00:00:00.500Z"),
            ("c", "u2", "2024-01-02T00:00:00Z"),
            ("d", "u1", "2024-01-02T00:00:00Z"),
        ] {
            store
                .insert(
                    Collection::Contexts,
                    json!({"id": id, "user_id": user, "created_at": at}),
                )
                .await
                .unwrap();
        }

        let query = Query::new(Collection::Contexts).eq("user_id", "u1").newest_first();
        let ids: Vec<String> = store
            .select(&query)
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "d", "a"]);

        assert_eq!(store.count(&query.clone().limit(1)).await.unwrap(), 3);
        assert_eq!(store.select(&query.limit(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_insert_update_delete() {
        let store = InMemoryDataStore::new();
        let row = store
            .insert(Collection::Automations, json!({"user_id": "u1", "active": true}))
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap().to_string();
        assert!(row.get("created_at").is_some());

        let active = Query::new(Collection::Automations).eq("active", true);
        assert_eq!(store.count(&active).await.unwrap(), 1);

        let by_id = Query::new(Collection::Automations).eq("id", &id);
        let updated = store.update(&by_id, json!({"active": false})).await.unwrap();
        assert_eq!(updated[0]["active"], json!(false));
        assert_eq!(store.count(&active).await.unwrap(), 0);

        store.delete(&by_id).await.unwrap();
        assert!(store.select(&by_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usage_rows_get_generated_at() {
        let store = InMemoryDataStore::new();
        let row = store
            .insert(
                Collection::PromptUsageAnalytics,
                json!({"user_id": "u1", "prompt_id": "p", "context_ids": []}),
            )
            .await
            .unwrap();
        assert!(row.get("generated_at").is_some());
        assert!(row.get("created_at").is_none());
    }

    #[tokio::test]
    async fn test_rest_select_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/prompts")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("select".into(), "*".into()),
                mockito::Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                mockito::Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            ]))
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer jwt")
            .with_status(200)
            .with_body(r#"[{"id":"p1","prompt_content":"Hi"}]"#)
            .create_async()
            .await;

        let store = RestDataStore::new(&BackendConfig {
            url: server.url(),
            anon_key: "anon".into(),
        })
        .with_access_token("jwt");
        let rows = store
            .select(&Query::new(Collection::Prompts).eq("user_id", "u1").newest_first())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rest_count_reads_content_range() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/coaches")
            .match_query(mockito::Matcher::Any)
            .match_header("prefer", "count=exact")
            .with_status(200)
            .with_header("content-range", "0-1/7")
            .with_body(r#"[{"id":"1"},{"id":"2"}]"#)
            .create_async()
            .await;

        let store = RestDataStore::new(&BackendConfig {
            url: server.url(),
            anon_key: "anon".into(),
        });
        let total = store
            .count(&Query::new(Collection::Coaches).eq("user_id", "u1"))
            .await
            .unwrap();
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn test_rest_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/contexts")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"JWT expired"}"#)
            .create_async()
            .await;

        let store = RestDataStore::new(&BackendConfig {
            url: server.url(),
            anon_key: "anon".into(),
        });
        let err = store
            .select(&Query::new(Collection::Contexts))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API error (401): JWT expired");
    }
}
