mod auth;
mod general;
mod request;
mod search;

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use indoc::indoc;
use log::debug;
use storedesk_client::{
    CancellationToken,
    CredentialStore,
    FormErrors,
    Mediator,
    Notifier,
    Outcome,
    Session,
    SessionScope,
    Success,
};

use crate::config::Config;
use crate::utils::message::{self, StderrNotifier};
use crate::utils::TerminalNavigator;

static STOREDESK_DESCRIPTION: &'_ str = indoc! {"
    Console for the storedesk e-commerce backend.\n\n

    Issue authenticated requests against the admin and storefront API,
    run live searches and manage stored sessions."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, descr(STOREDESK_DESCRIPTION))]
pub struct StoredeskCli(#[bpaf(external(storedesk_args))] pub StoredeskArgs);

/// Main storedesk args parser
///
/// To parse the storedesk CLI, use [`StoredeskCli`] instead using [`storedesk_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)] // we don't want this struct to be interpreted as a group
pub struct StoredeskArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    /// Use the admin session instead of the storefront user session
    #[bpaf(long)]
    pub admin: bool,

    #[bpaf(external(commands))]
    command: Commands,
}

impl StoredeskArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .context("Could not create data directory")?;

        let scope = if self.admin {
            SessionScope::Admin
        } else {
            SessionScope::User
        };
        let credentials = CredentialStore::open(config.credentials_path(), scope)
            .context("Could not open stored credentials")?;

        let console = Console {
            config,
            credentials: Arc::new(credentials),
            cancel: cancel_on_interrupt(),
        };

        debug!("running command with the {scope:?} session");
        self.command.handle(console).await
    }
}

/// Cancel in-flight requests when the user hits Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted, cancelling requests");
            trigger.cancel();
        }
    });
    cancel
}

#[derive(Bpaf, Clone)]
enum Commands {
    /// Fetch a resource
    #[bpaf(command)]
    Get(#[bpaf(external(request::get))] request::Get),

    /// Create a resource, or update one with --update
    #[bpaf(command)]
    Post(#[bpaf(external(request::post))] request::Post),

    /// Delete a resource
    #[bpaf(command)]
    Delete(#[bpaf(external(request::delete))] request::Delete),

    /// Search a collection, reading queries from stdin as they are typed
    #[bpaf(command)]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Manage stored sessions
    #[bpaf(command)]
    Auth(#[bpaf(external(auth::auth))] auth::Auth),

    /// Show or set the preferred locale
    #[bpaf(command)]
    Locale(#[bpaf(external(general::locale))] general::Locale),
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command")
    }
}

impl Commands {
    async fn handle(self, console: Console) -> Result<()> {
        match self {
            Commands::Get(args) => args.handle(console).await,
            Commands::Post(args) => args.handle(console).await,
            Commands::Delete(args) => args.handle(console).await,
            Commands::Search(args) => args.handle(console).await,
            Commands::Auth(args) => args.handle(console),
            Commands::Locale(args) => args.handle(console),
        }
    }
}

/// Everything a command needs to talk to the backend.
#[derive(Debug)]
pub struct Console {
    pub config: Config,
    pub credentials: Arc<CredentialStore>,
    pub cancel: CancellationToken,
}

impl Console {
    pub fn session(&self) -> Result<Session> {
        let saved_locale = self.credentials.credentials().locale;
        let mediator = Mediator::new(
            self.config.client_config(saved_locale),
            self.credentials.clone(),
        )
        .context("Could not set up the API client")?;
        Ok(Session::new(mediator, Some(Arc::new(TerminalNavigator))))
    }
}

/// Exit status for failed requests.
pub(crate) const EXIT_FAILURE: u8 = 1;
/// Exit status after Ctrl-C, as a shell reports SIGINT.
pub(crate) const EXIT_INTERRUPTED: u8 = 130;

/// A failure that has already been shown to the user.
#[derive(Debug)]
pub(crate) struct ReportedFailure(pub u8);

impl Display for ReportedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as Debug>::fmt(self, f)
    }
}
impl std::error::Error for ReportedFailure {}

/// Print an outcome: the body goes to stdout, notifications to stderr.
pub(crate) fn report(outcome: Outcome) -> Result<()> {
    if let Some(notification) = outcome.notification() {
        StderrNotifier.notify(notification);
    }
    let mut form_errors = FormErrors::new();
    form_errors.record(&outcome);
    for (field, messages) in form_errors.iter() {
        for field_message in messages {
            message::plain(format!("  {field}: {field_message}"));
        }
    }

    match outcome {
        Outcome::Success(success) => {
            if let Some(body) = render_body(&success)? {
                println!("{body}");
            }
            Ok(())
        },
        Outcome::Failure(_) => Err(ReportedFailure(EXIT_FAILURE).into()),
        Outcome::Cancelled => {
            message::warning("Request cancelled");
            Err(ReportedFailure(EXIT_INTERRUPTED).into())
        },
    }
}

/// Pretty printed response body, `None` when there is nothing to show.
fn render_body(success: &Success) -> Result<Option<String>> {
    if success.raw_body.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string_pretty(&success.raw_body)?))
}
