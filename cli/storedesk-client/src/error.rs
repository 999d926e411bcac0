//! Errors raised while building a mediator or touching stored credentials.
//!
//! Responses from the backend are never errors, they are classified into
//! [crate::Outcome] values instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String, #[source] reqwest::header::InvalidHeaderName),
    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String, #[source] reqwest::header::InvalidHeaderValue),
    #[error("could not build HTTP client")]
    Build(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not read credentials file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse credentials file '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
    #[error("could not write credentials file")]
    Write(#[source] std::io::Error),
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
}
