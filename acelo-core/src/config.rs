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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Acelo client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AceloConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub functions: FunctionsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the backend project (e.g., "https://xyz.supabase.co")
    #[serde(default)]
    pub url: String,

    /// Public anon key sent as `apikey` on every request
    #[serde(default)]
    pub anon_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionsConfig {
    /// Serverless function that turns a composed prompt into text
    #[serde(default = "default_generate_function")]
    pub generate_prompt: String,

    /// Serverless function that fans out to automation webhooks
    #[serde(default = "default_invoke_function")]
    pub invoke_automation: String,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            generate_prompt: default_generate_function(),
            invoke_automation: default_invoke_function(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Lifetime of signed download URLs in seconds
    #[serde(default = "default_signed_url_expiry")]
    pub signed_url_expiry_secs: u64,

    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            signed_url_expiry_secs: default_signed_url_expiry(),
            list_limit: default_list_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutomationConfig {
    /// Upper bound for a single webhook call
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_secs: default_webhook_timeout(),
        }
    }
}

// Default values
fn default_generate_function() -> String {
    "generate-prompt".to_string()
}

fn default_invoke_function() -> String {
    "invoke-automation".to_string()
}

fn default_bucket() -> String {
    "user-assets".to_string()
}

fn default_signed_url_expiry() -> u64 {
    3600
}

fn default_list_limit() -> usize {
    1000
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    1_000
}

fn default_webhook_timeout() -> u64 {
    60
}

impl Default for AceloConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                url: String::new(),
                anon_key: String::new(),
            },
            functions: FunctionsConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            automation: AutomationConfig::default(),
        }
    }
}

impl AceloConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variables on top of `self`
    ///
    /// Supported environment variables:
    /// - ACELO_BACKEND_URL: backend base URL
    /// - ACELO_ANON_KEY: backend anon key
    /// - ACELO_STORAGE_BUCKET: asset bucket (default: user-assets)
    /// - ACELO_SIGNED_URL_EXPIRY: signed URL lifetime in seconds (default: 3600)
    /// - ACELO_CACHE_ENABLED: enable the query cache (default: true)
    /// - ACELO_CACHE_TTL: query cache TTL in seconds (default: 300)
    /// - ACELO_WEBHOOK_TIMEOUT: automation webhook timeout in seconds (default: 60)
    pub fn merge_with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("ACELO_BACKEND_URL") {
            self.backend.url = url;
        }

        if let Ok(key) = std::env::var("ACELO_ANON_KEY") {
            self.backend.anon_key = key;
        }

        if let Ok(bucket) = std::env::var("ACELO_STORAGE_BUCKET") {
            self.storage.bucket = bucket;
        }

        if let Ok(expiry) = std::env::var("ACELO_SIGNED_URL_EXPIRY") {
            if let Ok(val) = expiry.parse() {
                self.storage.signed_url_expiry_secs = val;
            }
        }

        if let Ok(enabled) = std::env::var("ACELO_CACHE_ENABLED") {
            self.cache.enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(ttl) = std::env::var("ACELO_CACHE_TTL") {
            if let Ok(val) = ttl.parse() {
                self.cache.ttl_secs = val;
            }
        }

        if let Ok(timeout) = std::env::var("ACELO_WEBHOOK_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                self.automation.webhook_timeout_secs = val;
            }
        }

        self
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(config.merge_with_env())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            anyhow::bail!("Backend URL is not configured (set ACELO_BACKEND_URL)");
        }
        url::Url::parse(&self.backend.url)?;

        if self.backend.anon_key.trim().is_empty() {
            anyhow::bail!("Backend anon key is not configured (set ACELO_ANON_KEY)");
        }

        if self.automation.webhook_timeout_secs == 0 {
            anyhow::bail!("Webhook timeout must be greater than zero");
        }

        Ok(())
    }
}
