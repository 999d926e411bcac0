//! Expired-session handling on top of the [Mediator].

use std::fmt::Debug;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::Mediator;
use crate::types::{Body, FailureKind, Method, Outcome, method_override};

/// Route callers are sent to once their session is gone.
pub const LOGIN_ROUTE: &str = "/login";

/// Navigation service able to move the user to another route.
pub trait Navigator: Debug + Send + Sync {
    fn redirect(&self, route: &str);
}

/// A [Mediator] that reacts to `Unauthorized` outcomes by evicting all
/// stored tokens and redirecting to [LOGIN_ROUTE].
///
/// The outcome itself is passed through unchanged.
#[derive(Debug)]
pub struct Session {
    mediator: Mediator,
    navigator: Option<Arc<dyn Navigator>>,
}

impl Session {
    pub fn new(mediator: Mediator, navigator: Option<Arc<dyn Navigator>>) -> Self {
        Self {
            mediator,
            navigator,
        }
    }

    pub fn mediator(&self) -> &Mediator {
        &self.mediator
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let outcome = self.mediator.send(method, path, body, cancel).await;
        self.guard(&outcome);
        outcome
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

    fn guard(&self, outcome: &Outcome) {
        if outcome.failure_kind() != Some(FailureKind::Unauthorized) {
            return;
        }

        info!("session expired, clearing stored tokens");
        self.mediator.credentials().clear();

        match &self.navigator {
            Some(navigator) => navigator.redirect(LOGIN_ROUTE),
            None => debug!("no navigator configured, not redirecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::credentials::{CredentialProvider, Credentials, SessionScope, StaticCredentials};

    #[derive(Debug, Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, route: &str) {
            self.routes.lock().unwrap().push(route.to_string());
        }
    }

    fn logged_in() -> Arc<StaticCredentials> {
        Arc::new(StaticCredentials::new(SessionScope::Admin, Credentials {
            user_token: Some("user".into()),
            admin_token: Some("admin".into()),
            locale: Some("en".into()),
        }))
    }

    #[tokio::test]
    async fn unauthorized_clears_tokens_and_redirects() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|_, then| {
            then.status(401).json_body(json!({"message": "Unauthenticated."}));
        });

        let credentials = logged_in();
        let navigator = Arc::new(RecordingNavigator::default());
        let mediator =
            Mediator::new(ClientConfig::new(server.base_url()), credentials.clone()).unwrap();
        let session = Session::new(mediator, Some(navigator.clone()));

        let outcome = session.get("/admins", &CancellationToken::new()).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Unauthorized));
        assert_eq!(credentials.credentials(), Credentials {
            user_token: None,
            admin_token: None,
            locale: Some("en".into()),
        });
        assert_eq!(*navigator.routes.lock().unwrap(), vec![LOGIN_ROUTE]);
        mock.assert();
    }

    #[tokio::test]
    async fn unauthorized_without_navigator_still_clears_tokens() {
        let server = MockServer::start_async().await;
        let _mock = server.mock(|_, then| {
            then.status(401);
        });

        let credentials = logged_in();
        let mediator =
            Mediator::new(ClientConfig::new(server.base_url()), credentials.clone()).unwrap();
        let session = Session::new(mediator, None);

        let outcome = session.delete("/brands/1", &CancellationToken::new()).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Unauthorized));
        assert_eq!(credentials.token(), None);
    }

    #[tokio::test]
    async fn other_failures_keep_tokens() {
        let server = MockServer::start_async().await;
        let _mock = server.mock(|_, then| {
            then.status(404).json_body(json!({"message": "nope"}));
        });

        let credentials = logged_in();
        let navigator = Arc::new(RecordingNavigator::default());
        let mediator =
            Mediator::new(ClientConfig::new(server.base_url()), credentials.clone()).unwrap();
        let session = Session::new(mediator, Some(navigator.clone()));

        let outcome = session.get("/brands/1", &CancellationToken::new()).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound));
        assert_eq!(credentials.token().as_deref(), Some("admin"));
        assert!(navigator.routes.lock().unwrap().is_empty());
    }
}
