use crate::release::{parse_release, Release};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION},
    Client, RequestBuilder, StatusCode,
};
use std::{env, fmt::Debug};
use thiserror::Error;
use url::Url;

/// Where the latest release is described when no other feed URL is configured.
pub const DEFAULT_RELEASES_URL: &str =
    "https://api.github.com/repos/jutukuva/jutukuva/releases/latest";

const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// The ways that getting the latest release from the feed can fail.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed answered, but not with a success status.
    #[error("could not retrieve the latest release from {url}: {status}")]
    Unavailable { url: Url, status: StatusCode },
    /// The request never got an answer, or the body could not be read.
    #[error("request for the latest release to {url} failed")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    /// The feed answered with something that is not a release document.
    #[error("the release feed at {url} returned malformed data at `{path}`: {message}")]
    Malformed {
        url: Url,
        path: String,
        message: String,
    },
}

/// Something that can tell us about the latest release.
#[async_trait]
pub trait ReleaseSource: Debug + Send + Sync {
    async fn fetch_latest_release(&self) -> Result<Release, FeedError>;
}

/// A release feed served over HTTP, like the GitHub "latest release" API endpoint.
#[derive(Debug)]
pub struct ReleaseFeed {
    url: Url,
    token: Option<HeaderValue>,
    client: Client,
}

impl ReleaseFeed {
    /// Creates a feed for `url`. If `token` is `None`, the `GITHUB_TOKEN` env var is used if it is
    /// set.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be used as a header value.
    pub fn new(url: Url, token: Option<String>, client: Client) -> Result<Self> {
        let token = token.or_else(|| {
            let t = env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
            if t.is_some() {
                debug!("Using token from the {TOKEN_ENV_VAR} environment variable.");
            }
            t
        });
        let token = token
            .map(|t| {
                let mut val = HeaderValue::from_str(&format!("Bearer {t}"))?;
                val.set_sensitive(true);
                Ok::<_, anyhow::Error>(val)
            })
            .transpose()?;

        Ok(Self { url, token, client })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn maybe_add_token_header(&self, req_builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            debug!("Adding token to release feed request.");
            req_builder.header(AUTHORIZATION, token.clone())
        } else {
            debug!("No token given.");
            req_builder
        }
    }

    fn request_error(&self, source: reqwest::Error) -> FeedError {
        FeedError::Request {
            url: self.url.clone(),
            source,
        }
    }
}

#[async_trait]
impl ReleaseSource for ReleaseFeed {
    async fn fetch_latest_release(&self) -> Result<Release, FeedError> {
        debug!("Getting release info from `{}`", self.url);

        let req_builder = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        let req = self
            .maybe_add_token_header(req_builder)
            .build()
            .map_err(|e| self.request_error(e))?;
        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Unavailable {
                url: self.url.clone(),
                status,
            });
        }

        let body = resp.text().await.map_err(|e| self.request_error(e))?;
        let release = parse_release(&body).map_err(|e| FeedError::Malformed {
            url: self.url.clone(),
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
        debug!(
            "Release {} has {} assets",
            release.tag_name,
            release.assets.len()
        );

        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serial_test::serial;
    use test_log::test;

    const RELEASE_BODY: &str = r#"{
        "tag_name": "v0.4.1",
        "assets": [
            {
                "name": "Jutukuva.Subtiitrid_0.4.1_x64.exe",
                "browser_download_url": "https://example.com/Jutukuva.Subtiitrid_0.4.1_x64.exe"
            }
        ]
    }"#;

    fn feed_for(server: &Server, token: Option<&str>) -> Result<ReleaseFeed> {
        let url = Url::parse(&server.url())?.join("/releases/latest")?;
        ReleaseFeed::new(url, token.map(String::from), Client::new())
    }

    #[test(tokio::test)]
    #[serial]
    async fn fetch_latest_release_without_token() -> Result<()> {
        let vars = env::vars();
        env::remove_var(TOKEN_ENV_VAR);

        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/releases/latest")
            .match_header("Accept", "application/json")
            .match_header("Authorization", Matcher::Missing)
            .with_status(200)
            .with_body(RELEASE_BODY)
            .create_async()
            .await;

        let release = feed_for(&server, None)?.fetch_latest_release().await?;
        assert_eq!(release.tag_name, "v0.4.1");
        assert_eq!(release.assets[0].name, "Jutukuva.Subtiitrid_0.4.1_x64.exe");

        m.assert_async().await;

        for (k, v) in vars {
            env::set_var(k, v);
        }

        Ok(())
    }

    #[test(tokio::test)]
    #[serial]
    async fn fetch_latest_release_with_token() -> Result<()> {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/releases/latest")
            .match_header("Authorization", "Bearer ghp_fakeToken")
            .with_status(200)
            .with_body(RELEASE_BODY)
            .create_async()
            .await;

        feed_for(&server, Some("ghp_fakeToken"))?
            .fetch_latest_release()
            .await?;
        m.assert_async().await;

        Ok(())
    }

    #[test(tokio::test)]
    #[serial]
    async fn fetch_latest_release_with_token_from_env() -> Result<()> {
        let vars = env::vars();
        env::set_var(TOKEN_ENV_VAR, "ghp_envToken");

        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/releases/latest")
            .match_header("Authorization", "Bearer ghp_envToken")
            .with_status(200)
            .with_body(RELEASE_BODY)
            .create_async()
            .await;

        let res = feed_for(&server, None)?.fetch_latest_release().await;

        env::remove_var(TOKEN_ENV_VAR);
        for (k, v) in vars {
            env::set_var(k, v);
        }

        res?;
        m.assert_async().await;

        Ok(())
    }

    #[test(tokio::test)]
    #[serial]
    async fn non_success_status_is_unavailable() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/releases/latest")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let err = feed_for(&server, None)?
            .fetch_latest_release()
            .await
            .expect_err("a 404 is an error");
        match &err {
            FeedError::Unavailable { status, .. } => assert_eq!(*status, StatusCode::NOT_FOUND),
            FeedError::Request { .. } | FeedError::Malformed { .. } => {
                panic!("expected an Unavailable error, got {err:?}")
            }
        }

        Ok(())
    }

    #[test(tokio::test)]
    #[serial]
    async fn unexpected_shape_is_malformed() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_body(r#"{"tag_name": "v0.4.1", "assets": {"name": "not a list"}}"#)
            .create_async()
            .await;

        let err = feed_for(&server, None)?
            .fetch_latest_release()
            .await
            .expect_err("assets must be a list");
        match &err {
            FeedError::Malformed { path, .. } => assert_eq!(path, "assets"),
            FeedError::Request { .. } | FeedError::Unavailable { .. } => {
                panic!("expected a Malformed error, got {err:?}")
            }
        }
        assert!(err.to_string().contains("malformed data at `assets`"));

        Ok(())
    }

    #[test(tokio::test)]
    #[serial]
    async fn body_that_is_not_json_is_malformed() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_body("<html>rate limited</html>")
            .create_async()
            .await;

        let err = feed_for(&server, None)?
            .fetch_latest_release()
            .await
            .expect_err("HTML is not a release");
        assert!(matches!(err, FeedError::Malformed { .. }), "{err:?}");

        Ok(())
    }

    #[test]
    fn bad_token_is_rejected() -> Result<()> {
        let url = Url::parse(DEFAULT_RELEASES_URL)?;
        assert!(ReleaseFeed::new(url, Some("bad\ntoken".to_string()), Client::new()).is_err());
        Ok(())
    }
}
