//! Bearer token storage.
//!
//! The mediator never reads tokens from ambient state. It is handed a
//! [CredentialProvider] at construction and asks it for the current token
//! on every request.

use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CredentialError;

pub const CREDENTIALS_FILE: &str = "credentials.toml";

/// Source of the bearer token attached to outgoing requests.
pub trait CredentialProvider: Debug + Send + Sync {
    /// The token for the active session, if any.
    fn token(&self) -> Option<String>;

    /// Evict every stored token (end-user and admin).
    fn clear(&self);
}

/// Which of the stored sessions a provider hands out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionScope {
    /// Storefront end-user session.
    #[default]
    User,
    /// Admin console session.
    Admin,
}

/// Persisted credential record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Credentials {
    pub fn token(&self, scope: SessionScope) -> Option<&str> {
        match scope {
            SessionScope::User => self.user_token.as_deref(),
            SessionScope::Admin => self.admin_token.as_deref(),
        }
    }

    pub fn set_token(&mut self, scope: SessionScope, token: Option<String>) {
        let slot = match scope {
            SessionScope::User => &mut self.user_token,
            SessionScope::Admin => &mut self.admin_token,
        };
        *slot = token.filter(|token| !token.is_empty());
    }

    pub fn clear_tokens(&mut self) {
        self.user_token = None;
        self.admin_token = None;
    }
}

/// In-memory credentials, nothing is written to disk.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    scope: SessionScope,
    state: Mutex<Credentials>,
}

impl StaticCredentials {
    pub fn new(scope: SessionScope, credentials: Credentials) -> Self {
        Self {
            scope,
            state: Mutex::new(credentials),
        }
    }

    /// A user session holding `token`.
    pub fn user(token: impl Into<String>) -> Self {
        let mut credentials = Credentials::default();
        credentials.set_token(SessionScope::User, Some(token.into()));
        Self::new(SessionScope::User, credentials)
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn credentials(&self) -> Credentials {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token(self.scope)
            .map(ToString::to_string)
    }

    fn clear(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_tokens();
    }
}

/// Credentials backed by a TOML file.
///
/// Every change is written to a temporary file next to the target and then
/// moved into place.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    scope: SessionScope,
    state: Mutex<Credentials>,
}

impl CredentialStore {
    /// Open the store at `path`, a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, scope: SessionScope) -> Result<Self, CredentialError> {
        let path = path.into();
        let credentials = match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| CredentialError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(?path, "no credentials file found, starting empty");
                Credentials::default()
            },
            Err(source) => return Err(CredentialError::Read { path, source }),
        };

        Ok(Self {
            path,
            scope,
            state: Mutex::new(credentials),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scope(&self) -> SessionScope {
        self.scope
    }

    pub fn credentials(&self) -> Credentials {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(
        &self,
        scope: SessionScope,
        token: Option<String>,
    ) -> Result<(), CredentialError> {
        self.update(|credentials| credentials.set_token(scope, token))
    }

    pub fn set_locale(&self, locale: Option<String>) -> Result<(), CredentialError> {
        self.update(|credentials| credentials.locale = locale)
    }

    pub fn clear_tokens(&self) -> Result<(), CredentialError> {
        self.update(Credentials::clear_tokens)
    }

    fn update(&self, f: impl FnOnce(&mut Credentials)) -> Result<(), CredentialError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut updated = state.clone();
        f(&mut updated);
        write_credentials(&self.path, &updated)?;
        *state = updated;
        Ok(())
    }
}

impl CredentialProvider for CredentialStore {
    fn token(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token(self.scope)
            .map(ToString::to_string)
    }

    fn clear(&self) {
        if let Err(err) = self.clear_tokens() {
            warn!(%err, path = ?self.path, "could not remove tokens from credentials file");
        }
    }
}

fn write_credentials(path: &Path, credentials: &Credentials) -> Result<(), CredentialError> {
    let contents = toml::to_string(credentials)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(CredentialError::Write)?;

    let tempfile = tempfile::Builder::new()
        .tempfile_in(dir)
        .map_err(CredentialError::Write)?;
    fs::write(&tempfile, contents).map_err(CredentialError::Write)?;
    tempfile.persist(path)?;
    debug!(?path, "wrote credentials");
    Ok(())
}
