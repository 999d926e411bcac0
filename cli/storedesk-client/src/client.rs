//! The request mediator.

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{AuthHeaderPolicy, ClientConfig};
use crate::credentials::CredentialProvider;
use crate::error::ClientError;
use crate::types::*;

/// Performs single authenticated calls against the backend API and
/// classifies every response into an [Outcome].
///
/// The mediator holds no mutable state of its own: tokens come from the
/// injected [CredentialProvider], cancellation from the caller's token.
pub struct Mediator {
    http: reqwest::Client,
    base_url: String,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("api_url", &self.config.api_url)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Mediator {
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        Url::parse(&config.api_url).map_err(|source| ClientError::InvalidUrl {
            url: config.api_url.clone(),
            source,
        })?;

        let http = build_http_client(&config)?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            config,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.credentials
    }

    pub async fn get(&self, path: &str, cancel: &CancellationToken) -> Outcome {
        self.send(Method::Get, path, None, cancel).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: impl Into<Body>,
        cancel: &CancellationToken,
    ) -> Outcome {
        self.send(Method::Post, path, Some(body.into()), cancel)
            .await
    }

    /// Update a resource: a POST to `path?_method=put`.
    pub async fn update(
        &self,
        path: &str,
        body: impl Into<Body>,
        cancel: &CancellationToken,
    ) -> Outcome {
        self.send(Method::Post, &method_override(path), Some(body.into()), cancel)
            .await
    }

    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Outcome {
        self.send(Method::Delete, path, None, cancel).await
    }

    /// Perform one request and classify the result.
    ///
    /// Returns [Outcome::Cancelled] if `cancel` fires before a response
    /// has been classified. Never retries.
    #[instrument(skip_all, fields(%method, path = %path))]
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
        cancel: &CancellationToken,
    ) -> Outcome {
        if cancel.is_cancelled() {
            debug!("request cancelled before it was sent");
            return Outcome::Cancelled;
        }

        let request = match self.build_request(method, path, body) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "could not build request");
                return Outcome::Failure(Failure::new(FailureKind::Unknown, UNKNOWN_MESSAGE));
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("request cancelled");
                Outcome::Cancelled
            },
            outcome = execute(request) => outcome,
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
    ) -> Result<reqwest::RequestBuilder, reqwest::Error> {
        let url = join_url(&self.base_url, path);
        let mut request = self.http.request(method.into(), url);

        match (self.credentials.token(), self.config.auth_header) {
            (Some(token), _) => {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            },
            (None, AuthHeaderPolicy::SendNull) => {
                request = request.header(header::AUTHORIZATION, "Bearer null");
            },
            (None, AuthHeaderPolicy::Omit) => {},
        }

        request = match body {
            None => request,
            Some(Body::Json(value)) => request.json(&value),
            Some(Body::Multipart(form)) => request.multipart(form.to_form()?),
        };

        Ok(request)
    }
}

async fn execute(request: reqwest::RequestBuilder) -> Outcome {
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => return classify_transport_error(&err),
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => return classify_transport_error(&err),
    };

    classify(status, &body)
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

fn classify_transport_error(err: &reqwest::Error) -> Outcome {
    if err.is_builder() {
        warn!(%err, "invalid request");
        return Outcome::Failure(Failure::new(FailureKind::Unknown, UNKNOWN_MESSAGE));
    }
    debug!(%err, "no response received");
    Outcome::Failure(Failure::new(
        FailureKind::NetworkUnreachable,
        NETWORK_UNREACHABLE_MESSAGE,
    ))
}

/// Map a received response onto an [Outcome].
pub(crate) fn classify(status: StatusCode, body: &[u8]) -> Outcome {
    let json = parse_body(body);
    debug!(status = status.as_u16(), "classifying response");

    match status {
        StatusCode::OK | StatusCode::CREATED => {
            let message = body_message(&json).unwrap_or_default();
            Outcome::Success(Success {
                raw_body: json,
                message,
            })
        },
        StatusCode::UNAUTHORIZED => Outcome::Failure(Failure::new(
            FailureKind::Unauthorized,
            UNAUTHORIZED_MESSAGE,
        )),
        StatusCode::NOT_FOUND => Outcome::Failure(Failure::new(
            FailureKind::NotFound,
            body_message(&json).unwrap_or_else(|| NOT_FOUND_MESSAGE.to_string()),
        )),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let field_errors = validation_errors(body);
            Outcome::Failure(Failure {
                kind: FailureKind::Validation,
                message: VALIDATION_MESSAGE.to_string(),
                field_errors: Some(field_errors),
            })
        },
        StatusCode::TOO_MANY_REQUESTS => Outcome::Failure(Failure::new(
            FailureKind::RateLimited,
            RATE_LIMITED_MESSAGE,
        )),
        _ => Outcome::Failure(Failure::new(FailureKind::Unknown, UNKNOWN_MESSAGE)),
    }
}

/// Copy the `errors` map of a validation response entry by entry, in the
/// order the backend sent them.
///
/// Arrays keep their string messages, a plain string becomes a single
/// message, anything else is skipped without affecting other fields.
fn validation_errors(body: &[u8]) -> FieldErrors {
    let errors = match serde_json::from_slice::<ValidationBody>(body) {
        Ok(ValidationBody { errors }) => errors,
        Err(err) => {
            debug!(%err, "validation response without an errors map");
            return FieldErrors::default();
        },
    };

    errors
        .into_iter()
        .filter_map(|(field, messages)| {
            let messages = match messages {
                Value::String(message) => vec![message],
                Value::Array(messages) => messages
                    .into_iter()
                    .filter_map(|message| match message {
                        Value::String(message) => Some(message),
                        other => {
                            debug!(%field, %other, "skipping non-string validation message");
                            None
                        },
                    })
                    .collect(),
                other => {
                    debug!(%field, %other, "skipping malformed validation entry");
                    return None;
                },
            };
            Some((field, messages))
        })
        .collect()
}

fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        debug!(%err, "response body is not JSON");
        Value::Null
    })
}

fn body_message(json: &Value) -> Option<String> {
    if !json.is_object() {
        return None;
    }
    serde_json::from_value::<MessageBody>(json.clone())
        .ok()
        .and_then(|body| body.message)
}

// ---------------------------------------------------------------------------
// HTTP client builder
// ---------------------------------------------------------------------------

/// Build the HTTP client with the headers shared by every request.
fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );

    if let Some(locale) = &config.locale {
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_str(locale).map_err(|e| {
                ClientError::InvalidHeaderValue(header::ACCEPT_LANGUAGE.to_string(), e)
            })?,
        );
    }

    for (key, value) in &config.extra_headers {
        headers.insert(
            HeaderName::from_str(key)
                .map_err(|e| ClientError::InvalidHeaderName(key.clone(), e))?,
            HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidHeaderValue(key.clone(), e))?,
        );
    }

    debug!(
        api_url = %config.api_url,
        locale = ?config.locale,
        extra_headers = config.extra_headers.len(),
        "building HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60));

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder.build().map_err(ClientError::Build)
}
