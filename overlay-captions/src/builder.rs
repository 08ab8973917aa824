//! The `builder` module contains the `OverlayDownloadBuilder` struct which is used to create an
//! `OverlayDownload` instance.

use crate::{
    config::Config,
    download::OverlayDownload,
    feed::ReleaseFeed,
    picker::{AssetPicker, PRODUCT_MARKER},
    platform::{detect_platform, Platform},
};
use anyhow::{anyhow, Result};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use url::Url;

/// `OverlayDownloadBuilder` is used to create an [`OverlayDownload`] instance.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct OverlayDownloadBuilder<'a> {
    releases_url: Option<&'a str>,
    token: Option<&'a str>,
    platform: Option<Platform>,
    user_agent: Option<&'a str>,
    marker: Option<&'a str>,
}

impl<'a> OverlayDownloadBuilder<'a> {
    /// Returns a new empty `OverlayDownloadBuilder`.
    #[must_use]
    pub fn new() -> Self {
        OverlayDownloadBuilder::default()
    }

    /// Set the URL of the release feed. If this is not set, the
    /// [`RELEASES_URL_ENV_VAR`](crate::RELEASES_URL_ENV_VAR) env var is used, and if that is not
    /// set either, the public releases endpoint.
    #[must_use]
    pub fn releases_url(mut self, url: &'a str) -> Self {
        self.releases_url = Some(url);
        self
    }

    /// Set a token to send with feed requests. If this is not set, then the `GITHUB_TOKEN` env var
    /// is used if it is set.
    #[must_use]
    pub fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the platform to pick an installer for. If neither this nor `user_agent` is set, the
    /// platform this code was compiled for is used.
    ///
    /// You cannot set both this and `user_agent`.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set a browser user agent to guess the platform from.
    ///
    /// You cannot set both this and `platform`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: &'a str) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Set the product marker that installer names must contain. The default is
    /// [`PRODUCT_MARKER`].
    #[must_use]
    pub fn marker(mut self, marker: &'a str) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Builds a new [`OverlayDownload`] instance and returns it.
    ///
    /// # Errors
    ///
    /// If you set both `platform` and `user_agent`, set an empty marker, or the releases URL (from
    /// the builder or the environment) is not a valid URL, then this method will return an error.
    pub fn build(self) -> Result<OverlayDownload<'a>> {
        if self.platform.is_some() && self.user_agent.is_some() {
            return Err(anyhow!("You cannot set both a platform and a user agent"));
        }
        if self.marker.is_some_and(str::is_empty) {
            return Err(anyhow!("The product marker cannot be empty"));
        }

        let platform = self.determine_platform();
        let releases_url = self.determine_releases_url()?;
        let client = reqwest_client()?;
        let feed = ReleaseFeed::new(releases_url, self.token.map(String::from), client.clone())?;
        let picker = AssetPicker::with_marker(self.marker.unwrap_or(PRODUCT_MARKER), platform);

        Ok(OverlayDownload::new(Box::new(feed), picker, client))
    }

    fn determine_platform(&self) -> Platform {
        let platform = if let Some(p) = self.platform {
            p
        } else if let Some(ua) = self.user_agent {
            detect_platform(ua)
        } else {
            Platform::current()
        };
        debug!("platform = {platform}");
        platform
    }

    fn determine_releases_url(&self) -> Result<Url> {
        let url = if let Some(u) = self.releases_url {
            Url::parse(u)?
        } else {
            Config::releases_url_from_env()?
        };
        debug!("releases url = {url}");
        Ok(url)
    }
}

fn reqwest_client() -> Result<Client> {
    let builder = Client::builder().gzip(true);

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("overlay-captions version {}", super::VERSION))?,
    );
    Ok(builder.default_headers(headers).build()?)
}
