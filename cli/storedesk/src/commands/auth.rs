use anyhow::{Context, Result};
use bpaf::Bpaf;
use storedesk_client::SessionScope;
use tracing::instrument;

use super::Console;
use crate::utils::message;

#[derive(Clone, Debug, Bpaf)]
pub enum Auth {
    /// Store a token for the selected session
    #[bpaf(command)]
    Login {
        /// Token issued by the backend
        #[bpaf(long, argument("TOKEN"))]
        token: String,
    },

    /// Forget the tokens of both sessions
    #[bpaf(command)]
    Logout,

    /// Print the current login status
    #[bpaf(command)]
    Status,
}

impl Auth {
    #[instrument(name = "auth", skip_all)]
    pub fn handle(self, console: Console) -> Result<()> {
        let store = &console.credentials;
        let scope = store.scope();
        match self {
            Auth::Login { token } => {
                store
                    .set_token(scope, Some(token))
                    .context("Could not save token")?;
                message::updated(format!("Logged in to the {} session", scope_name(scope)));
            },
            Auth::Logout => {
                if store.credentials().token(scope).is_none() {
                    message::warning("You are not logged in");
                }
                store.clear_tokens().context("Could not remove tokens")?;
                message::updated("Logged out");
            },
            Auth::Status => {
                let credentials = store.credentials();
                message::plain(format!("API: {}", console.config.api_url));
                for scope in [SessionScope::User, SessionScope::Admin] {
                    let state = match credentials.token(scope) {
                        Some(_) => "logged in",
                        None => "not logged in",
                    };
                    message::plain(format!("{}: {state}", scope_name(scope)));
                }
            },
        }
        Ok(())
    }
}

fn scope_name(scope: SessionScope) -> &'static str {
    match scope {
        SessionScope::User => "user",
        SessionScope::Admin => "admin",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use storedesk_client::{CredentialStore, Credentials};

    use super::*;
    use crate::commands::test_helpers::{console, console_in};

    const API_URL: &str = "http://localhost:8000/api";

    fn stored(console: &Console) -> Credentials {
        CredentialStore::open(console.config.credentials_path(), SessionScope::User)
            .unwrap()
            .credentials()
    }

    #[test]
    fn login_stores_the_token() {
        let (console, dir) = console(API_URL);
        Auth::Login {
            token: "secret".to_string(),
        }
        .handle(console)
        .unwrap();

        let console = console_in(API_URL, &dir);
        assert_eq!(stored(&console).user_token.as_deref(), Some("secret"));
        assert_eq!(stored(&console).admin_token, None);
    }

    #[test]
    fn logout_forgets_both_sessions() {
        let (console, dir) = console(API_URL);
        console
            .credentials
            .set_token(SessionScope::User, Some("user".into()))
            .unwrap();
        console
            .credentials
            .set_token(SessionScope::Admin, Some("admin".into()))
            .unwrap();
        console.credentials.set_locale(Some("ar".into())).unwrap();

        Auth::Logout.handle(console).unwrap();

        let console = console_in(API_URL, &dir);
        assert_eq!(stored(&console), Credentials {
            user_token: None,
            admin_token: None,
            locale: Some("ar".into()),
        });
    }

    #[test]
    fn logout_without_session_succeeds() {
        let (console, _dir) = console(API_URL);
        assert!(Auth::Logout.handle(console).is_ok());
    }

    #[test]
    fn status_does_not_change_credentials() {
        let (console, dir) = console(API_URL);
        Auth::Status.handle(console).unwrap();

        let console = console_in(API_URL, &dir);
        assert_eq!(stored(&console), Credentials::default());
    }
}
