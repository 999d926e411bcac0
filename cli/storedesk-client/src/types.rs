//! Request and outcome types exchanged with the mediator.

use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Query parameter the backend reads to treat a POST as an update.
pub const METHOD_OVERRIDE_PARAM: &str = "_method";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

/// Turn `path` into the "virtual PUT" form understood by the backend,
/// i.e. `path?_method=put`, to be sent with [Method::Post].
pub fn method_override(path: impl AsRef<str>) -> String {
    let path = path.as_ref();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{METHOD_OVERRIDE_PARAM}=put")
}

/// Name of an array-indexed form field, e.g. `categories[0][name]`.
fn indexed_field(collection: &str, index: usize, field: &str) -> String {
    format!("{collection}[{index}][{field}]")
}

/// Request payload, passed through to the backend unmodified.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Multipart(MultipartBody),
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<MultipartBody> for Body {
    fn from(form: MultipartBody) -> Self {
        Body::Multipart(form)
    }
}

/// A multipart form that can be rebuilt for every send.
///
/// `reqwest::multipart::Form` is consumed by the request, so the parts are
/// kept here and converted right before a request is made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime,
            bytes,
        });
        self
    }

    /// Add one text field per `(field, value)` pair of an indexed record,
    /// e.g. `categories[0][name]` and `categories[0][trans_lang]`.
    pub fn indexed<'a>(
        mut self,
        collection: &str,
        index: usize,
        fields: impl IntoIterator<Item = (&'a str, String)>,
    ) -> Self {
        for (field, value) in fields {
            self = self.text(indexed_field(collection, index, field), value);
        }
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file_part =
                        reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file_part = file_part.mime_str(mime)?;
                    }
                    form.part(name.clone(), file_part)
                },
            };
        }
        Ok(form)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Field path (e.g. `categories.0.name`) to messages, in backend order.
pub type FieldErrors = IndexMap<String, Vec<String>>;

pub const UNAUTHORIZED_MESSAGE: &str = "Your session has expired. Please log in again.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource could not be found.";
pub const VALIDATION_MESSAGE: &str = "The given data was invalid.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
pub const NETWORK_UNREACHABLE_MESSAGE: &str =
    "Could not reach the server. Please check your connection.";
pub const UNKNOWN_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Uniform result of a single mediated request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
    /// The caller cancelled the request; never surfaced to the user.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    pub raw_body: Value,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub field_errors: Option<FieldErrors>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Validation,
    RateLimited,
    Unauthorized,
    NetworkUnreachable,
    Unknown,
}

impl Failure {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: None,
        }
    }
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Failure(failure) => Some(failure.kind),
            _ => None,
        }
    }

    /// Convert into a `Result`, `Cancelled` becomes `Ok(None)`.
    pub fn into_result(self) -> Result<Option<Success>, Failure> {
        match self {
            Outcome::Success(success) => Ok(Some(success)),
            Outcome::Failure(failure) => Err(failure),
            Outcome::Cancelled => Ok(None),
        }
    }

    /// The notification a caller should display, if any.
    pub fn notification(&self) -> Option<Notification> {
        match self {
            Outcome::Success(success) => Some(Notification {
                kind: NotificationKind::Success,
                message: success.message.clone(),
            }),
            Outcome::Failure(failure) => {
                let kind = match failure.kind {
                    FailureKind::RateLimited | FailureKind::Validation => {
                        NotificationKind::Warning
                    },
                    _ => NotificationKind::Error,
                };
                Some(Notification {
                    kind,
                    message: failure.message.clone(),
                })
            },
            Outcome::Cancelled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValidationBody {
    #[serde(default)]
    pub errors: IndexMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Dispatcher for user-visible notifications.
pub trait Notifier {
    fn notify(&self, notification: Notification);
}
