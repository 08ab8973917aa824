use crate::{feed::DEFAULT_RELEASES_URL, settings::DEFAULT_SYNC_SERVER_URL};
use log::debug;
use std::env;
use thiserror::Error;
use url::Url;

/// Overrides the URL of the release feed.
pub const RELEASES_URL_ENV_VAR: &str = "OVERLAY_CAPTIONS_RELEASES_URL";
/// Overrides the URL of the collaboration sync server.
pub const SYNC_URL_ENV_VAR: &str = "OVERLAY_CAPTIONS_SYNC_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the {var} environment variable is not a valid URL: `{value}`")]
    InvalidUrl { var: &'static str, value: String },
}

/// Endpoints that can be overridden from the environment at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub releases_url: Url,
    pub sync_url: Url,
}

impl Config {
    /// Reads the config from the process environment. Unset or empty variables leave the default
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to something that is not a URL.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads only [`RELEASES_URL_ENV_VAR`], falling back to [`DEFAULT_RELEASES_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is set to something that is not a URL.
    pub fn releases_url_from_env() -> Result<Url, ConfigError> {
        url_from(
            &|name: &str| env::var(name).ok(),
            RELEASES_URL_ENV_VAR,
            DEFAULT_RELEASES_URL,
        )
    }

    /// Reads only [`SYNC_URL_ENV_VAR`], falling back to [`DEFAULT_SYNC_SERVER_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is set to something that is not a URL.
    pub fn sync_url_from_env() -> Result<Url, ConfigError> {
        url_from(
            &|name: &str| env::var(name).ok(),
            SYNC_URL_ENV_VAR,
            DEFAULT_SYNC_SERVER_URL,
        )
    }

    fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            releases_url: url_from(&lookup, RELEASES_URL_ENV_VAR, DEFAULT_RELEASES_URL)?,
            sync_url: url_from(&lookup, SYNC_URL_ENV_VAR, DEFAULT_SYNC_SERVER_URL)?,
        })
    }
}

fn url_from<F>(lookup: &F, var: &'static str, default: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(var) {
        Some(v) if !v.trim().is_empty() => {
            debug!("Using {var} from the environment: {v}");
            v
        }
        Some(_) | None => default.to_string(),
    };
    Url::parse(value.trim()).map_err(|_| ConfigError::InvalidUrl { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_overrides() -> Result<()> {
        let config = Config::from_lookup(lookup(&[]))?;
        assert_eq!(config.releases_url.as_str(), DEFAULT_RELEASES_URL);
        assert_eq!(config.sync_url.as_str(), DEFAULT_SYNC_SERVER_URL);
        Ok(())
    }

    #[test]
    fn overrides_are_used() -> Result<()> {
        let config = Config::from_lookup(lookup(&[
            (RELEASES_URL_ENV_VAR, "https://releases.example.com/latest.json"),
            (SYNC_URL_ENV_VAR, "ws://localhost:1234"),
        ]))?;
        assert_eq!(
            config.releases_url.as_str(),
            "https://releases.example.com/latest.json"
        );
        assert_eq!(config.sync_url.as_str(), "ws://localhost:1234/");
        Ok(())
    }

    #[test]
    fn empty_overrides_are_ignored() -> Result<()> {
        let config = Config::from_lookup(lookup(&[
            (RELEASES_URL_ENV_VAR, ""),
            (SYNC_URL_ENV_VAR, "   "),
        ]))?;
        assert_eq!(config, Config::from_lookup(lookup(&[]))?);
        Ok(())
    }

    #[test]
    fn invalid_override_is_an_error() {
        let res = Config::from_lookup(lookup(&[(SYNC_URL_ENV_VAR, "not a url")]));
        assert_eq!(
            res,
            Err(ConfigError::InvalidUrl {
                var: SYNC_URL_ENV_VAR,
                value: "not a url".to_string(),
            }),
        );
    }

    #[test]
    #[serial]
    fn single_var_lookups_ignore_the_other_var() -> Result<()> {
        let vars = env::vars();
        env::set_var(RELEASES_URL_ENV_VAR, "not a url");
        env::set_var(SYNC_URL_ENV_VAR, "ws://localhost:1234");

        let sync = Config::sync_url_from_env();
        let releases = Config::releases_url_from_env();

        env::remove_var(RELEASES_URL_ENV_VAR);
        env::remove_var(SYNC_URL_ENV_VAR);
        for (k, v) in vars {
            env::set_var(k, v);
        }

        assert_eq!(sync?.as_str(), "ws://localhost:1234/");
        assert_eq!(
            releases,
            Err(ConfigError::InvalidUrl {
                var: RELEASES_URL_ENV_VAR,
                value: "not a url".to_string(),
            }),
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn from_process_env() -> Result<()> {
        let vars = env::vars();
        env::set_var(RELEASES_URL_ENV_VAR, "https://mirror.example.com/latest");
        env::remove_var(SYNC_URL_ENV_VAR);

        let res = Config::from_env();

        env::remove_var(RELEASES_URL_ENV_VAR);
        for (k, v) in vars {
            env::set_var(k, v);
        }

        let config = res?;
        assert_eq!(
            config.releases_url.as_str(),
            "https://mirror.example.com/latest"
        );
        assert_eq!(config.sync_url.as_str(), DEFAULT_SYNC_SERVER_URL);
        Ok(())
    }
}
