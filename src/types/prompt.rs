use crate::{Error, ErrorContext, Result};

/// Prompt text that passed the type gate.
///
/// Delivery layers hand over whatever their body parser produced; anything
/// other than a string (missing field, file upload, number, array) is rejected
/// here, before fingerprinting and before any store interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInput(String);

impl PromptInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Extract `field` from a parsed form or JSON body.
    pub fn from_field(body: &serde_json::Value, field: &str) -> Result<Self> {
        match body.get(field) {
            Some(serde_json::Value::String(s)) => Ok(Self(s.clone())),
            Some(other) => Err(Error::invalid_input_with_context(
                format!("{} is not a string", field),
                ErrorContext::new()
                    .with_field_path(field.to_string())
                    .with_details(format!("got {}", json_kind(other)))
                    .with_source("prompt_input"),
            )),
            None => Err(Error::invalid_input_with_context(
                format!("{} is missing", field),
                ErrorContext::new()
                    .with_field_path(field.to_string())
                    .with_source("prompt_input"),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for PromptInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
