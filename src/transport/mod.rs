//! Shared HTTP plumbing for the REST-backed store and generator adapters.

mod http;

pub use http::{build_client, ApiAccount, DEFAULT_API_BASE_URL};

pub(crate) use http::{body_excerpt, env_parse, is_transient_status, required_env};
