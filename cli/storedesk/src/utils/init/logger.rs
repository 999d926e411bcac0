use std::sync::OnceLock;

use log::{debug, error};
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

static LOGGER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let log_filter = filter_for(verbosity.unwrap_or_default());

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (subscriber, reload_handle) = create_registry_and_filter_reload_handle();
        subscriber.init();
        reload_handle
    });

    update_filters(filter_handle, log_filter);
}

fn filter_for(verbosity: Verbosity) -> &'static str {
    // `storedesk` also matches the `storedesk_client` target
    match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,storedesk=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,storedesk=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,storedesk=info",
        // Also show debug, including request classification
        Verbosity::Verbose(2) => "off,storedesk=debug",
        // Trace our own crates, debug for HTTP internals
        Verbosity::Verbose(3) => "debug,storedesk=trace",
        Verbosity::Verbose(_) => "trace",
    }
}

pub fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("Updating logger filter failed: {}", err);
            },
        };
    });
    if let Err(err) = result {
        error!("Updating logger filter failed: {}", err);
    }
}

pub fn create_registry_and_filter_reload_handle() -> (
    impl tracing_subscriber::layer::SubscriberExt,
    Handle<EnvFilter, Registry>,
) {
    debug!("Initializing logger");
    // The first filter sets an upper bound for `log` verbosity,
    // so start at `trace` and narrow it down through the reload handle.
    let filter = EnvFilter::new("trace");
    let (filter, filter_reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(log_layer);

    (registry, filter_reload_handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_verbosity_yields_a_valid_filter() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Verbose(0),
            Verbosity::Verbose(1),
            Verbosity::Verbose(2),
            Verbosity::Verbose(3),
            Verbosity::Verbose(9),
        ] {
            let filter = filter_for(verbosity);
            assert!(EnvFilter::try_new(filter).is_ok(), "invalid filter {filter}");
        }
    }

    #[test]
    fn one_directive_covers_both_crates() {
        for verbosity in [Verbosity::Quiet, Verbosity::Verbose(0), Verbosity::Verbose(2)] {
            let filter = filter_for(verbosity);
            assert_eq!(filter.matches("storedesk").count(), 1, "{filter}");
            assert!(!filter.contains("storedesk_client"), "{filter}");
        }
    }
}
