//! Replicated keyed-store client speaking an Upstash-style REST protocol.
//!
//! Commands are posted as JSON arrays to the store endpoint with a bearer
//! token; responses carry either a `result` or an `error` field. Failures
//! surface as [`StoreError`] and are absorbed by the fallback wrapper, not
//! by repository callers.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StoreError;

use super::KeyedStore;

#[derive(Debug, Deserialize)]
struct CommandResponse {
    result: Option<Value>,
    error: Option<String>,
}

/// REST client for the replicated keyed store.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestStore {
    /// Create a client for the store at `base_url` with `token` auth.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn command(&self, cmd: Value) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&cmd)
            .send()
            .await?
            .error_for_status()?;

        let body: CommandResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(StoreError::Command(error));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

fn as_string_array(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl KeyedStore for RestStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(json!(["GET", key])).await? {
            Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let cmd = match ttl {
            Some(ttl) => json!(["SET", key, value, "EX", ttl.as_secs()]),
            None => json!(["SET", key, value]),
        };
        self.command(cmd).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.command(json!(["DEL", key])).await?;
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        self.command(json!(["ZADD", key, score, member])).await?;
        Ok(())
    }

    async fn zrange_recent(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let result = self
            .command(json!(["ZRANGE", key, 0, limit.saturating_sub(1), "REV"]))
            .await?;
        Ok(as_string_array(result))
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.command(json!(["ZREM", key, member])).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.command(json!(["SADD", key, member])).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.command(json!(["SREM", key, member])).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let result = self.command(json!(["SMEMBERS", key])).await?;
        Ok(as_string_array(result))
    }
}
