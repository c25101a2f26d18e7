//! Text-to-image client for a Workers AI account.

use super::ImageGenerator;
use crate::transport::{self, ApiAccount};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "@cf/stabilityai/stable-diffusion-xl-base-1.0";
pub const DEFAULT_NUM_STEPS: u32 = 20;

/// Runs a text-to-image model and returns the raw image bytes it produces.
pub struct WorkersAiGenerator {
    http_client: reqwest::Client,
    account: ApiAccount,
    model: String,
    num_steps: u32,
}

impl WorkersAiGenerator {
    pub fn builder() -> WorkersAiGeneratorBuilder {
        WorkersAiGeneratorBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn num_steps(&self) -> u32 {
        self.num_steps
    }
}

#[async_trait]
impl ImageGenerator for WorkersAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        // Model ids contain '/', which must stay a path separator here.
        let mut segments = vec!["ai", "run"];
        segments.extend(self.model.split('/'));
        let endpoint = self.account.endpoint(&segments);
        let body = serde_json::json!({
            "prompt": prompt,
            "num_steps": self.num_steps,
        });
        let response = self
            .http_client
            .post(endpoint)
            .bearer_auth(self.account.api_token())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::generation_failed(format!("text-to-image request failed: {}", e)))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            Error::generation_failed(format!("Failed to read text-to-image response: {}", e))
        })?;
        if !status.is_success() {
            return Err(Error::generation_failed(format!(
                "text-to-image API error ({}): {}",
                status,
                transport::body_excerpt(&bytes)
            )));
        }
        if bytes.is_empty() {
            return Err(Error::generation_failed("text-to-image API returned an empty body"));
        }
        debug!(model = %self.model, bytes = bytes.len(), "image generated");
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

pub struct WorkersAiGeneratorBuilder {
    account: Option<ApiAccount>,
    model: Option<String>,
    num_steps: Option<u32>,
    timeout_secs: u64,
}

impl WorkersAiGeneratorBuilder {
    pub fn new() -> Self {
        Self {
            account: None,
            model: None,
            num_steps: None,
            timeout_secs: 120,
        }
    }
    pub fn account(mut self, account: ApiAccount) -> Self {
        self.account = Some(account);
        self
    }
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
    pub fn num_steps(mut self, steps: u32) -> Self {
        self.num_steps = Some(steps);
        self
    }
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<WorkersAiGenerator> {
        let account = match self.account {
            Some(a) => a,
            None => ApiAccount::from_env()?,
        };
        let model = self
            .model
            .or_else(|| std::env::var("IMAGINE_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(Error::configuration("Model must not be empty"));
        }
        let num_steps = self
            .num_steps
            .or_else(|| transport::env_parse("IMAGINE_NUM_STEPS"))
            .unwrap_or(DEFAULT_NUM_STEPS);
        let http_client = transport::build_client(Duration::from_secs(self.timeout_secs))?;
        Ok(WorkersAiGenerator {
            http_client,
            account,
            model,
            num_steps,
        })
    }
}

impl Default for WorkersAiGeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
