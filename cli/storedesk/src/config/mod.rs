use std::collections::BTreeMap;
use std::path::PathBuf;
use std::{env, fs};

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use log::debug;
use serde::{Deserialize, Serialize};
use storedesk_client::{AuthHeaderPolicy, CREDENTIALS_FILE, ClientConfig};
use xdg::BaseDirectories;

/// Name of storedesk managed directories (config, data)
const STOREDESK_DIR_NAME: &str = "storedesk";
const STOREDESK_CONFIG_DIR_VAR: &str = "STOREDESK_CONFIG_DIR";
const STOREDESK_ENV_PREFIX: &str = "STOREDESK";
pub const STOREDESK_CONFIG_FILE: &str = "storedesk.toml";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Describes the configuration of the storedesk console
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Origin of the backend API
    pub api_url: String,

    /// Preferred locale, overridden by the locale saved with `storedesk locale`
    pub locale: Option<String>,

    /// Whether anonymous requests send `Bearer null` or no header at all
    #[serde(default)]
    pub auth_header: AuthHeaderPolicy,

    /// Delay before a live search is sent
    pub debounce_ms: u64,

    /// Directory where storedesk keeps credentials (default:
    /// `$XDG_DATA_HOME/storedesk`)
    pub data_dir: PathBuf,

    /// Directory where storedesk loads its configuration file from (default:
    /// `$XDG_CONFIG_HOME/storedesk`)
    pub config_dir: PathBuf,

    /// Headers added to every request
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl Config {
    /// Creates a [Config] from the environment and config files
    ///
    /// Sources in increasing precedence:
    /// defaults, `/etc/storedesk/storedesk.toml`, XDG config files,
    /// `$STOREDESK_CONFIG_DIR/storedesk.toml`, `STOREDESK_*` variables.
    pub fn parse() -> Result<Config> {
        let dirs = BaseDirectories::with_prefix(STOREDESK_DIR_NAME);

        let data_dir = dirs
            .get_data_home()
            .context("Could not determine data directory, is $HOME set?")?;

        let config_dir = match env::var(STOREDESK_CONFIG_DIR_VAR) {
            Ok(v) => {
                debug!("`${STOREDESK_CONFIG_DIR_VAR}` set: {v}");
                PathBuf::from(v)
            },
            Err(_) => {
                let config_dir = dirs
                    .get_config_home()
                    .context("Could not determine config directory, is $HOME set?")?;
                debug!("`${STOREDESK_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                config_dir
            },
        };
        fs::create_dir_all(&config_dir)
            .context(format!("Could not create config directory: {config_dir:?}"))?;

        let mut builder = HierarchicalConfig::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("debounce_ms", DEFAULT_DEBOUNCE_MS as i64)?
            .set_default("data_dir", data_dir.to_string_lossy().as_ref())?
            // The config file cannot change the config dir.
            .set_override("config_dir", config_dir.to_string_lossy().as_ref())?;

        // read from /etc
        builder = builder.add_source(
            config::File::from(
                PathBuf::from("/etc")
                    .join(STOREDESK_DIR_NAME)
                    .join(STOREDESK_CONFIG_FILE),
            )
            .format(config::FileFormat::Toml)
            .required(false),
        );

        // look for files in XDG_CONFIG_DIRS locations
        for file in dirs.find_config_files(STOREDESK_CONFIG_FILE) {
            builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
        }

        // Add explicit config dir file last
        builder = builder.add_source(
            config::File::from(config_dir.join(STOREDESK_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // override via env variables
        let builder = builder.add_source(Self::environment(env::vars()));

        let config: Config = builder
            .build()?
            .try_deserialize()
            .context("Could not parse config")?;
        Ok(config)
    }

    /// `STOREDESK_*` variables, minus the ones that only select directories.
    fn environment(vars: impl Iterator<Item = (String, String)>) -> Environment {
        let vars = vars
            .filter(|(k, _)| k.starts_with(&format!("{STOREDESK_ENV_PREFIX}_")))
            .filter(|(k, _)| k != STOREDESK_CONFIG_DIR_VAR)
            .collect();
        Environment::with_prefix(STOREDESK_ENV_PREFIX)
            .source(Some(vars))
            .try_parsing(true)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(CREDENTIALS_FILE)
    }

    /// Client configuration, `saved_locale` wins over the configured locale.
    pub fn client_config(&self, saved_locale: Option<String>) -> ClientConfig {
        ClientConfig {
            locale: saved_locale.or_else(|| self.locale.clone()),
            auth_header: self.auth_header,
            extra_headers: self.extra_headers.clone(),
            user_agent: Some(format!("storedesk/{}", env!("CARGO_PKG_VERSION"))),
            ..ClientConfig::new(self.api_url.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn defaults_apply_without_files() {
        let config_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                (STOREDESK_CONFIG_DIR_VAR, Some(config_dir.path().as_os_str())),
                ("STOREDESK_DATA_DIR", Some(data_dir.path().as_os_str())),
            ],
            || {
                let config = Config::parse().unwrap();
                assert_eq!(config.api_url, DEFAULT_API_URL);
                assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
                assert_eq!(config.auth_header, AuthHeaderPolicy::SendNull);
                assert_eq!(config.config_dir, config_dir.path());
                assert_eq!(config.data_dir, data_dir.path());
            },
        );
    }

    #[test]
    #[serial]
    fn file_and_environment_are_layered() {
        let config_dir = tempfile::tempdir().unwrap();
        fs::write(
            config_dir.path().join(STOREDESK_CONFIG_FILE),
            indoc::indoc! {r#"
                api_url = "https://shop.example.com/api"
                auth_header = "omit"
                debounce_ms = 250
                locale = "en"
            "#},
        )
        .unwrap();

        temp_env::with_vars(
            [
                (STOREDESK_CONFIG_DIR_VAR, Some(config_dir.path().as_os_str())),
                ("STOREDESK_LOCALE", Some("ar".as_ref())),
            ],
            || {
                let config = Config::parse().unwrap();
                assert_eq!(config.api_url, "https://shop.example.com/api");
                assert_eq!(config.auth_header, AuthHeaderPolicy::Omit);
                assert_eq!(config.debounce_ms, 250);
                assert_eq!(config.locale.as_deref(), Some("ar"));
            },
        );
    }

    #[test]
    fn saved_locale_wins() {
        let config = Config {
            api_url: DEFAULT_API_URL.to_string(),
            locale: Some("en".to_string()),
            auth_header: AuthHeaderPolicy::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            data_dir: PathBuf::from("/data"),
            config_dir: PathBuf::from("/config"),
            extra_headers: BTreeMap::new(),
        };
        assert_eq!(
            config.client_config(Some("ar".into())).locale.as_deref(),
            Some("ar")
        );
        assert_eq!(config.client_config(None).locale.as_deref(), Some("en"));
        assert_eq!(
            config.credentials_path(),
            PathBuf::from("/data").join(CREDENTIALS_FILE)
        );
    }
}
