//! Request mediation for the storedesk console backend.
//!
//! This crate provides:
//! - the [Mediator], which performs one authenticated HTTP call and
//!   classifies the response into an [Outcome]
//! - a [Session] wrapper that evicts credentials and redirects to the login
//!   route when the backend reports an expired session
//! - a [Debouncer] for live search inputs
//! - credential storage and per-field form error state
//!
//! ## Usage
//!
//! ```ignore
//! use storedesk_client::{ClientConfig, Mediator, StaticCredentials};
//! use tokio_util::sync::CancellationToken;
//!
//! let mediator = Mediator::new(
//!     ClientConfig::new("https://api.example.com"),
//!     Arc::new(StaticCredentials::user(token)),
//! )?;
//! let outcome = mediator.get("/brands", &CancellationToken::new()).await;
//! ```

mod client;
mod config;
mod credentials;
mod debounce;
mod error;
mod form;
mod session;
mod types;

pub use client::Mediator;
pub use config::{AuthHeaderPolicy, ClientConfig};
pub use credentials::{
    CREDENTIALS_FILE,
    CredentialProvider,
    CredentialStore,
    Credentials,
    SessionScope,
    StaticCredentials,
};
pub use debounce::{DebouncePhase, Debouncer, Pending};
pub use error::{ClientError, CredentialError};
pub use form::FormErrors;
pub use session::{LOGIN_ROUTE, Navigator, Session};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
