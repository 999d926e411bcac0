//! Configuration types for mediator construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Configuration for [crate::Mediator] construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the backend API, every request path is joined onto it.
    pub api_url: String,
    /// Preferred locale, sent as `Accept-Language` when set.
    pub locale: Option<String>,
    /// What to send when no bearer token is available.
    pub auth_header: AuthHeaderPolicy,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            locale: None,
            auth_header: AuthHeaderPolicy::default(),
            extra_headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}

/// Handling of the `Authorization` header for anonymous requests.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthHeaderPolicy {
    /// Send `Authorization: Bearer null`.
    #[default]
    SendNull,
    /// Leave the header off entirely.
    Omit,
}
