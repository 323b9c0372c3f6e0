//! Plugin token exchange and caching.
//!
//! The Feishu Project API authenticates a plugin with a short-lived
//! `plugin_token` obtained from `/open_api/authen/plugin_token`. The token is
//! cached in memory until a request reports it expired, at which point the
//! cache is cleared and the next call exchanges the credentials again.
//! Concurrent requests rejected with the same token clear the cache once.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::{ClientError, Credentials};

pub const PLUGIN_TOKEN_PATH: &str = "/open_api/authen/plugin_token";

/// Lifecycle of the bearer token attached to every request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Cached token, exchanging credentials first if none is cached.
    async fn token(&self) -> Result<String, ClientError>;

    /// Drop the cached token if it is still `rejected`. A token another task
    /// already refreshed is kept.
    async fn invalidate(&self, rejected: &str);

    /// Drop whatever is cached.
    async fn clear(&self);
}

pub struct PluginTokenManager {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    cached: RwLock<Option<String>>,
}

impl PluginTokenManager {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            base_url: credentials.base_url()?,
            credentials,
            cached: RwLock::new(None),
        })
    }

    /// Exchange the credentials for a fresh token without touching the cache.
    pub async fn exchange(&self) -> Result<String, ClientError> {
        let url = self.base_url.join(PLUGIN_TOKEN_PATH)?;
        debug!(url = %url, plugin_id = %self.credentials.plugin_id, "requesting plugin token");

        let res: Value = self
            .http
            .post(url)
            .json(&json!({
                "plugin_id": self.credentials.plugin_id,
                "plugin_secret": self.credentials.plugin_secret,
                "type": self.credentials.token_type.code(),
            }))
            .send()
            .await?
            .json()
            .await?;

        match res.pointer("/data/token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_owned()),
            _ => {
                let code = match res.pointer("/error/code") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => "UNKNOWN".to_owned(),
                };
                let message = res
                    .pointer("/error/msg")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_owned();
                Err(ClientError::Auth { code, message })
            }
        }
    }
}

#[async_trait]
impl TokenProvider for PluginTokenManager {
    async fn token(&self) -> Result<String, ClientError> {
        {
            let cache = self.cached.read().await;
            if let Some(token) = cache.as_ref() {
                return Ok(token.clone());
            }
        }

        let mut cache = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cache.as_ref() {
            return Ok(token.clone());
        }

        let token = self.exchange().await?;
        info!(plugin_id = %self.credentials.plugin_id, "plugin token obtained");
        *cache = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self, rejected: &str) {
        let mut cache = self.cached.write().await;
        if cache.as_deref() == Some(rejected) {
            debug!(plugin_id = %self.credentials.plugin_id, "dropping rejected plugin token");
            *cache = None;
        }
    }

    async fn clear(&self) {
        let mut cache = self.cached.write().await;
        *cache = None;
    }
}
