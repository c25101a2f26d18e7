use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "form.prompt", "config.namespace")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "prompt_input", "workers_kv")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Failures of the binary codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
}

/// Failures of the image generator, as seen by the cache.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation failed: {message}")]
    Failed { message: String },

    #[error("generation timed out after {}ms", .after.as_millis())]
    TimedOut { after: Duration },
}

/// Failures of the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient I/O failure; the cache never retries on its own.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// The store answered but refused the request (auth, quota, bad key).
    #[error("store rejected request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Unified error type for the generation cache.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {message}{}", format_context(.context))]
    InvalidInput {
        message: String,
        context: ErrorContext,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new invalid-input error with structured context
    pub fn invalid_input_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidInput {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Error::Store(StoreError::Unavailable {
            message: msg.into(),
        })
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Error::Generation(GenerationError::Failed {
            message: msg.into(),
        })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidInput { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Generation(GenerationError::TimedOut { .. }))
    }

    /// Whether a later identical call may succeed; used by callers that own retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Generation(_) | Error::Store(StoreError::Unavailable { .. }) | Error::Io(_)
        )
    }
}
