use anyhow::{Context, Result, bail};
use bpaf::Bpaf;

use super::Console;
use crate::utils::message;

/// Show or set the locale sent as `Accept-Language`
#[derive(Clone, Debug, Bpaf)]
pub struct Locale {
    /// Forget the saved locale and fall back to the configured one
    #[bpaf(long)]
    pub reset: bool,

    /// Locale tag, e.g. `en` or `ar`
    #[bpaf(positional("LOCALE"))]
    pub locale: Option<String>,
}

impl Locale {
    pub fn handle(self, console: Console) -> Result<()> {
        let store = &console.credentials;
        match (self.reset, self.locale) {
            (true, Some(_)) => bail!("'--reset' cannot be combined with a locale"),
            (true, None) => {
                store.set_locale(None).context("Could not reset locale")?;
                message::updated("Locale reset");
            },
            (false, Some(locale)) => {
                store
                    .set_locale(Some(locale.clone()))
                    .context("Could not save locale")?;
                message::updated(format!("Locale set to '{locale}'"));
            },
            (false, None) => {
                let saved = store.credentials().locale;
                match saved.or_else(|| console.config.locale.clone()) {
                    Some(locale) => message::plain(locale),
                    None => message::plain("No locale set"),
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::commands::test_helpers::{console, console_in};

    const API_URL: &str = "http://localhost:8000/api";

    fn locale_args(reset: bool, locale: Option<&str>) -> Locale {
        Locale {
            reset,
            locale: locale.map(String::from),
        }
    }

    #[test]
    fn locale_is_saved_and_reset() {
        let (console, dir) = console(API_URL);
        locale_args(false, Some("ar")).handle(console).unwrap();

        let console = console_in(API_URL, &dir);
        assert_eq!(console.credentials.credentials().locale.as_deref(), Some("ar"));
        let saved = console.credentials.credentials().locale;
        assert_eq!(
            console.config.client_config(saved).locale.as_deref(),
            Some("ar")
        );

        locale_args(true, None).handle(console).unwrap();
        let console = console_in(API_URL, &dir);
        assert_eq!(console.credentials.credentials().locale, None);
    }

    #[test]
    fn reset_cannot_be_combined_with_a_locale() {
        let (console, dir) = console(API_URL);
        assert!(locale_args(true, Some("en")).handle(console).is_err());

        let console = console_in(API_URL, &dir);
        assert_eq!(console.credentials.credentials().locale, None);
    }

    #[test]
    fn showing_the_locale_changes_nothing() {
        let (console, dir) = console(API_URL);
        locale_args(false, None).handle(console).unwrap();

        let console = console_in(API_URL, &dir);
        assert_eq!(console.credentials.credentials().locale, None);
    }
}
