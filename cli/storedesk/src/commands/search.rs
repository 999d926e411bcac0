use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use log::debug;
use storedesk_client::{CancellationToken, Debouncer, Outcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use url::form_urlencoded;

use super::{Console, EXIT_INTERRUPTED, ReportedFailure, report};
use crate::utils::message;

/// Live search over a collection
///
/// Every line read from stdin replaces the current query.
/// A request is only sent once no new query arrived for the debounce delay.
#[derive(Bpaf, Clone, Debug)]
pub struct Search {
    /// Query parameter carrying the search term
    #[bpaf(long, argument("PARAM"), fallback("search".to_string()))]
    pub param: String,

    /// Debounce delay in milliseconds (default: `debounce_ms` from the config)
    #[bpaf(long("delay"), argument("MS"))]
    pub delay_ms: Option<u64>,

    /// Collection path, e.g. `/products`
    #[bpaf(positional("PATH"))]
    pub path: String,
}

type SearchResult = Result<()>;

impl Search {
    pub async fn handle(self, console: Console) -> Result<()> {
        self.run(&console, BufReader::new(tokio::io::stdin())).await
    }

    /// Search for every line of `input` until it ends or the console is
    /// interrupted.
    ///
    /// Fails with the first failed search, or with the interrupt status.
    async fn run(&self, console: &Console, input: impl AsyncBufRead + Unpin) -> Result<()> {
        let delay = Duration::from_millis(self.delay_ms.unwrap_or(console.config.debounce_ms));
        let session = Arc::new(console.session()?);

        let debouncer = {
            let path = self.path.clone();
            let param = self.param.clone();
            Debouncer::new(
                move |query: String, token: CancellationToken| {
                    let session = Arc::clone(&session);
                    let path = search_path(&path, &param, &query);
                    async move {
                        debug!("searching: {path}");
                        (query, session.get(&path, &token).await)
                    }
                },
                delay,
            )
        };

        let mut searches: JoinSet<SearchResult> = JoinSet::new();
        let mut first_failure = None;

        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = console.cancel.cancelled() => return interrupted(&debouncer),
                line = lines.next_line() => line.context("Could not read query from stdin")?,
            };
            let Some(query) = line else {
                break;
            };

            let pending = debouncer.invoke(query.trim().to_string());
            searches.spawn(async move {
                match pending.await {
                    Some((query, outcome)) => print_results(&query, outcome),
                    None => Ok(()),
                }
            });

            while let Some(finished) = searches.try_join_next() {
                keep_first_failure(&mut first_failure, finished)?;
            }
        }

        // Input is done, wait for the last query while still honoring Ctrl-C.
        loop {
            let finished = tokio::select! {
                biased;
                _ = console.cancel.cancelled() => return interrupted(&debouncer),
                finished = searches.join_next() => finished,
            };
            let Some(finished) = finished else {
                break;
            };
            keep_first_failure(&mut first_failure, finished)?;
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn keep_first_failure(
    first_failure: &mut Option<anyhow::Error>,
    finished: Result<SearchResult, tokio::task::JoinError>,
) -> Result<()> {
    if let Err(err) = finished.context("Search task failed")? {
        first_failure.get_or_insert(err);
    }
    Ok(())
}

fn interrupted<A, T>(debouncer: &Debouncer<A, T>) -> Result<()> {
    debouncer.cancel();
    message::warning("Search cancelled");
    Err(ReportedFailure(EXIT_INTERRUPTED).into())
}

fn print_results(query: &str, outcome: Outcome) -> Result<()> {
    if !matches!(outcome, Outcome::Cancelled) {
        message::plain(format!("Results for '{query}':"));
    }
    report(outcome)
}

/// Append `param=query` to `path`, form-encoding the query.
fn search_path(path: &str, param: &str, query: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{path}{separator}{param}={encoded}")
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::commands::EXIT_FAILURE;
    use crate::commands::test_helpers::{console, exit_status};

    fn search(delay_ms: u64) -> Search {
        Search {
            param: "search".to_string(),
            delay_ms: Some(delay_ms),
            path: "/products".to_string(),
        }
    }

    #[test]
    fn query_is_encoded() {
        assert_eq!(
            search_path("/products", "search", "red shoes & bags"),
            "/products?search=red+shoes+%26+bags"
        );
    }

    #[test]
    fn query_extends_existing_parameters() {
        assert_eq!(
            search_path("/products?page=2", "name", "hat"),
            "/products?page=2&name=hat"
        );
    }

    #[tokio::test]
    async fn only_the_last_buffered_query_is_sent() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/products")
                .query_param("search", "sho");
            then.status(200).json_body(json!({"data": []}));
        });
        let (console, _dir) = console(&server.base_url());

        // Earlier queries would hit no mock and fail with a 404.
        let result = search(50).run(&console, &b"s\nsh\nsho\n"[..]).await;

        assert!(result.is_ok(), "{result:?}");
        mock.assert();
    }

    #[tokio::test]
    async fn failed_search_sets_the_exit_status() {
        let server = MockServer::start_async().await;
        let _mock = server.mock(|_, then| {
            then.status(500);
        });
        let (console, _dir) = console(&server.base_url());

        let result = search(10).run(&console, &b"shoes\n"[..]).await;

        assert_eq!(exit_status(result), Some(EXIT_FAILURE));
    }

    #[tokio::test]
    async fn interrupt_after_input_ends_cancels_the_search() {
        let server = MockServer::start_async().await;
        let _mock = server.mock(|_, then| {
            then.status(200)
                .json_body(json!({"data": []}))
                .delay(Duration::from_secs(30));
        });
        let (console, _dir) = console(&server.base_url());

        let cancel = console.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            search(10).run(&console, &b"shoes\n"[..]),
        )
        .await
        .expect("search did not stop after the interrupt");

        assert_eq!(exit_status(result), Some(EXIT_INTERRUPTED));
    }

    #[tokio::test]
    async fn interrupt_while_reading_input_cancels_the_search() {
        let server = MockServer::start_async().await;
        let (console, _dir) = console(&server.base_url());
        console.cancel.cancel();

        // A reader that never yields a line.
        let (_writer, reader) = tokio::io::duplex(64);
        let result = search(10).run(&console, BufReader::new(reader)).await;

        assert_eq!(exit_status(result), Some(EXIT_INTERRUPTED));
    }
}
