use crate::{Error, ErrorContext, Result};
use reqwest::{Proxy, StatusCode};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Account-scoped REST endpoint shared by the KV and AI adapters.
#[derive(Clone)]
pub struct ApiAccount {
    base_url: Url,
    account_id: String,
    api_token: String,
}

impl std::fmt::Debug for ApiAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAccount")
            .field("base_url", &self.base_url.as_str())
            .field("account_id", &self.account_id)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl ApiAccount {
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base URL is valid"),
            account_id: account_id.into(),
            api_token: api_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid API base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("IMAGINE_API_BASE_URL")
                    .with_details(base_url.to_string()),
            )
        })?;
        if url.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "API base URL cannot carry a path: {}",
                base_url
            )));
        }
        self.base_url = url;
        Ok(self)
    }

    /// Resolve from `CLOUDFLARE_ACCOUNT_ID`, `CLOUDFLARE_API_TOKEN` and the
    /// optional `IMAGINE_API_BASE_URL` override.
    pub fn from_env() -> Result<Self> {
        let account_id = required_env("CLOUDFLARE_ACCOUNT_ID")?;
        let api_token = required_env("CLOUDFLARE_API_TOKEN")?;
        let account = Self::new(account_id, api_token);
        match env::var("IMAGINE_API_BASE_URL") {
            Ok(base) => account.with_base_url(&base),
            Err(_) => Ok(account),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub(crate) fn api_token(&self) -> &str {
        &self.api_token
    }

    /// `{base}/accounts/{account_id}/{segments...}`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected on construction
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("accounts")
                .push(&self.account_id)
                .extend(segments);
        }
        url
    }
}

pub(crate) fn required_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            Error::configuration_with_context(
                format!("{} is not set", name),
                ErrorContext::new().with_field_path(name.to_string()),
            )
        })
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

/// Build a pooled client. `IMAGINE_HTTP_TIMEOUT_SECS` overrides `default_timeout`.
pub fn build_client(default_timeout: Duration) -> Result<reqwest::Client> {
    let timeout = env_parse::<u64>("IMAGINE_HTTP_TIMEOUT_SECS")
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);

    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(env_parse::<usize>("IMAGINE_HTTP_POOL_MAX_IDLE_PER_HOST").unwrap_or(32))
        .pool_idle_timeout(Some(Duration::from_secs(
            env_parse::<u64>("IMAGINE_HTTP_POOL_IDLE_TIMEOUT_SECS").unwrap_or(90),
        )));

    if let Ok(proxy_url) = env::var("IMAGINE_PROXY_URL") {
        if let Ok(proxy) = Proxy::all(&proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder
        .build()
        .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Statuses worth retrying later, as opposed to requests the server refused outright.
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// First bytes of an error body, lossily decoded, for error messages.
pub(crate) fn body_excerpt(body: &[u8]) -> String {
    const MAX: usize = 512;
    let text = String::from_utf8_lossy(&body[..body.len().min(MAX)]);
    if body.len() > MAX {
        format!("{}...", text.trim_end())
    } else {
        text.trim_end().to_string()
    }
}
