use storedesk_client::{LOGIN_ROUTE, Navigator};

pub mod init;
pub mod message;

/// Terminal counterpart of a login redirect.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect(&self, route: &str) {
        if route == LOGIN_ROUTE {
            message::warning(
                "Your session has expired and the stored token was removed.\n   Log in again with 'storedesk auth login --token <TOKEN>'.",
            );
        } else {
            message::plain(format!("Continue at '{route}'"));
        }
    }
}
