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

//! Per-user object storage
//!
//! Every object lives under `{user_id}/{file_name}` in a single bucket.

use crate::error::{check_response, BackendError, Result};
use acelo_core::asset::object_path;
use acelo_core::config::{BackendConfig, StorageConfig};
use acelo_core::validation::require;
use acelo_core::AssetFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Files under the user's prefix
    async fn list(&self, user_id: &str) -> Result<Vec<AssetFile>>;

    /// Store a file and return its object path
    async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String>;

    async fn remove(&self, user_id: &str, file_names: &[String]) -> Result<()>;

    /// Time-boxed download URL
    async fn create_signed_url(&self, user_id: &str, file_name: &str, expires_in_secs: u64) -> Result<String>;
}

pub struct HttpObjectStorage {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    bucket: String,
    list_limit: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl HttpObjectStorage {
    pub fn new(backend: &BackendConfig, storage: &StorageConfig) -> Self {
        Self {
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            access_token: None,
            bucket: storage.bucket.clone(),
            list_limit: storage.list_limit,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}/storage/v1{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn list(&self, user_id: &str) -> Result<Vec<AssetFile>> {
        let body = serde_json::json!({
            "prefix": user_id,
            "limit": self.list_limit,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "desc" }
        });
        let response = self
            .request(reqwest::Method::POST, &format!("/object/list/{}", self.bucket))
            .json(&body)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        require("file_name", file_name)?;
        let path = object_path(user_id, file_name);
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/object/{}/{}", self.bucket, path),
            )
            .header(
                "Content-Type",
                content_type.unwrap_or("application/octet-stream"),
            )
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check_response(response).await?;
        tracing::info!(path = %path, "Uploaded asset");
        Ok(path)
    }

    async fn remove(&self, user_id: &str, file_names: &[String]) -> Result<()> {
        let prefixes: Vec<String> = file_names
            .iter()
            .map(|name| object_path(user_id, name))
            .collect();
        let response = self
            .request(reqwest::Method::DELETE, &format!("/object/{}", self.bucket))
            .json(&serde_json::json!({ "prefixes": prefixes }))
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    async fn create_signed_url(&self, user_id: &str, file_name: &str, expires_in_secs: u64) -> Result<String> {
        let path = object_path(user_id, file_name);
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/object/sign/{}/{}", self.bucket, path),
            )
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let signed: SignedUrl = check_response(response).await?.json().await?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    id: String,
    bytes: Vec<u8>,
    content_type: String,
    created_at: DateTime<Utc>,
}

/// In-process object storage
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, user_id: &str, file_name: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&object_path(user_id, file_name))
            .map(|o| o.bytes.clone())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn list(&self, user_id: &str) -> Result<Vec<AssetFile>> {
        let prefix = format!("{}/", user_id);
        Ok(self
            .objects
            .read()
            .iter()
            .filter_map(|(path, object)| {
                let name = path.strip_prefix(&prefix)?;
                let metadata = HashMap::from([
                    ("size".to_string(), serde_json::json!(object.bytes.len())),
                    ("mimetype".to_string(), serde_json::json!(object.content_type)),
                ]);
                Some(AssetFile {
                    name: name.to_string(),
                    id: Some(object.id.clone()),
                    created_at: Some(object.created_at),
                    metadata: Some(metadata),
                })
            })
            .collect())
    }

    async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        require("file_name", file_name)?;
        let path = object_path(user_id, file_name);
        let mut objects = self.objects.write();
        if objects.contains_key(&path) {
            return Err(BackendError::Api {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        objects.insert(
            path.clone(),
            StoredObject {
                id: uuid::Uuid::new_v4().to_string(),
                bytes,
                content_type: content_type.unwrap_or("application/octet-stream").to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(path)
    }

    async fn remove(&self, user_id: &str, file_names: &[String]) -> Result<()> {
        let mut objects = self.objects.write();
        for name in file_names {
            objects.remove(&object_path(user_id, name));
        }
        Ok(())
    }

    async fn create_signed_url(&self, user_id: &str, file_name: &str, expires_in_secs: u64) -> Result<String> {
        let path = object_path(user_id, file_name);
        if !self.objects.read().contains_key(&path) {
            return Err(BackendError::NotFound(path));
        }
        Ok(format!("memory://{}?expires_in={}", path, expires_in_secs))
    }
}
