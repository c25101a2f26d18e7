//! Workers KV namespace accessed through its REST API.

use super::KvStore;
use crate::error::StoreError;
use crate::transport::{self, ApiAccount};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Store adapter for a single KV namespace.
pub struct WorkersKvStore {
    http_client: reqwest::Client,
    account: ApiAccount,
    namespace_id: String,
}

impl WorkersKvStore {
    pub fn builder() -> WorkersKvStoreBuilder {
        WorkersKvStoreBuilder::new()
    }

    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    fn value_url(&self, key: &str) -> url::Url {
        self.account.endpoint(&[
            "storage",
            "kv",
            "namespaces",
            &self.namespace_id,
            "values",
            key,
        ])
    }
}

fn classify(status: StatusCode, body: &[u8]) -> Error {
    let message = transport::body_excerpt(body);
    if transport::is_transient_status(status) {
        StoreError::Unavailable {
            message: format!("HTTP {}: {}", status.as_u16(), message),
        }
        .into()
    } else {
        StoreError::Rejected {
            status: status.as_u16(),
            message,
        }
        .into()
    }
}

fn unavailable(action: &str, e: reqwest::Error) -> Error {
    Error::store_unavailable(format!("KV {} failed: {}", action, e))
}

#[async_trait]
impl KvStore for WorkersKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .http_client
            .get(self.value_url(key))
            .bearer_auth(self.account.api_token())
            .send()
            .await
            .map_err(|e| unavailable("read", e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(key, "kv miss");
            return Ok(None);
        }
        let body = response.bytes().await.map_err(|e| unavailable("read", e))?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        debug!(key, bytes = body.len(), "kv hit");
        Ok(Some(body.to_vec()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let response = self
            .http_client
            .put(self.value_url(key))
            .bearer_auth(self.account.api_token())
            .header("Content-Type", "application/octet-stream")
            .body(value.to_vec())
            .send()
            .await
            .map_err(|e| unavailable("write", e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(classify(status, &body));
        }
        debug!(key, bytes = value.len(), "kv write");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "workers-kv"
    }
}

pub struct WorkersKvStoreBuilder {
    account: Option<ApiAccount>,
    namespace_id: Option<String>,
    timeout_secs: u64,
}

impl WorkersKvStoreBuilder {
    pub fn new() -> Self {
        Self {
            account: None,
            namespace_id: None,
            timeout_secs: 30,
        }
    }
    pub fn account(mut self, account: ApiAccount) -> Self {
        self.account = Some(account);
        self
    }
    pub fn namespace_id(mut self, id: impl Into<String>) -> Self {
        self.namespace_id = Some(id.into());
        self
    }
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Missing pieces fall back to the environment (`CLOUDFLARE_*`, `IMAGINE_KV_NAMESPACE_ID`).
    pub fn build(self) -> Result<WorkersKvStore> {
        let account = match self.account {
            Some(a) => a,
            None => ApiAccount::from_env()?,
        };
        let namespace_id = match self.namespace_id {
            Some(id) => id,
            None => transport::required_env("IMAGINE_KV_NAMESPACE_ID")?,
        };
        let http_client = transport::build_client(Duration::from_secs(self.timeout_secs))?;
        Ok(WorkersKvStore {
            http_client,
            account,
            namespace_id,
        })
    }
}

impl Default for WorkersKvStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
