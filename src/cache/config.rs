//! Generation cache configuration.

use super::key::DEFAULT_ARTIFACT_PREFIX;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// When the prompt record is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Every `resolve` first records the prompt, making the result reachable by fingerprint.
    #[default]
    Eager,
    /// Only the artifact record is written; `lookup_existing` sees nothing for these prompts.
    Lazy,
}

impl std::str::FromStr for WriteMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eager" => Ok(Self::Eager),
            "lazy" => Ok(Self::Lazy),
            other => Err(Error::configuration_with_context(
                format!("unknown write mode: {}", other),
                ErrorContext::new().with_details("expected \"eager\" or \"lazy\""),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub write_mode: WriteMode,
    /// Prepended to every store key, e.g. `"staging:"`.
    pub namespace: Option<String>,
    pub artifact_prefix: String,
    /// `None` lets the generator run unbounded.
    pub generation_timeout: Option<Duration>,
    pub single_flight: bool,
    pub max_prompt_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::Eager,
            namespace: None,
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            generation_timeout: Some(Duration::from_secs(120)),
            single_flight: false,
            max_prompt_bytes: 4096,
        }
    }
}

/// On-disk shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    write_mode: Option<WriteMode>,
    namespace: Option<String>,
    artifact_prefix: Option<String>,
    generation_timeout_secs: Option<u64>,
    single_flight: Option<bool>,
    max_prompt_bytes: Option<usize>,
}

impl CacheConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self { self.write_mode = mode; self }
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self { self.namespace = Some(ns.into()); self }
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self { self.artifact_prefix = prefix.into(); self }
    pub fn with_generation_timeout(mut self, timeout: Option<Duration>) -> Self { self.generation_timeout = timeout; self }
    pub fn with_single_flight(mut self, enabled: bool) -> Self { self.single_flight = enabled; self }
    pub fn with_max_prompt_bytes(mut self, max: usize) -> Self { self.max_prompt_bytes = max; self }

    /// Defaults overridden by `IMAGINE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env(|name| std::env::var(name).ok())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let mut cfg = Self::default();
        if let Some(mode) = file.write_mode { cfg.write_mode = mode; }
        if let Some(ns) = file.namespace { cfg.namespace = Some(ns); }
        if let Some(prefix) = file.artifact_prefix { cfg.artifact_prefix = prefix; }
        if let Some(secs) = file.generation_timeout_secs { cfg.generation_timeout = timeout_from_secs(secs); }
        if let Some(sf) = file.single_flight { cfg.single_flight = sf; }
        if let Some(max) = file.max_prompt_bytes { cfg.max_prompt_bytes = max; }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    fn merge_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("IMAGINE_WRITE_MODE") {
            self.write_mode = v.parse()?;
        }
        if let Some(v) = var("IMAGINE_NAMESPACE") {
            self.namespace = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = var("IMAGINE_ARTIFACT_PREFIX") {
            self.artifact_prefix = v;
        }
        if let Some(v) = var("IMAGINE_GENERATION_TIMEOUT_SECS") {
            self.generation_timeout = timeout_from_secs(parse_env("IMAGINE_GENERATION_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("IMAGINE_SINGLE_FLIGHT") {
            self.single_flight = parse_bool("IMAGINE_SINGLE_FLIGHT", &v)?;
        }
        if let Some(v) = var("IMAGINE_MAX_PROMPT_BYTES") {
            self.max_prompt_bytes = parse_env("IMAGINE_MAX_PROMPT_BYTES", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        // An empty prefix would make the artifact key collide with the prompt key.
        if self.artifact_prefix.is_empty() {
            return Err(Error::configuration_with_context(
                "artifact prefix must not be empty",
                ErrorContext::new().with_field_path("artifact_prefix"),
            ));
        }
        if self.max_prompt_bytes == 0 {
            return Err(Error::configuration_with_context(
                "max_prompt_bytes must be positive",
                ErrorContext::new().with_field_path("max_prompt_bytes"),
            ));
        }
        Ok(())
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("invalid value for {}", name),
            ErrorContext::new()
                .with_field_path(name.to_string())
                .with_details(value.to_string()),
        )
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => parse_env::<bool>(name, value),
    }
}
