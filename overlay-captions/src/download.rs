use crate::{
    feed::ReleaseSource,
    picker::AssetPicker,
    platform::Platform,
    release::{Release, ReleaseAsset},
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client, StatusCode,
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// `OverlayDownload` finds, and optionally downloads, the overlay captions installer for one
/// platform. Use the [`OverlayDownloadBuilder`](crate::OverlayDownloadBuilder) struct to create a
/// new instance.
#[derive(Debug)]
pub struct OverlayDownload<'a> {
    source: Box<dyn ReleaseSource>,
    asset_picker: AssetPicker<'a>,
    reqwest_client: Client,
}

/// The installer picked from the latest release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatestDownload {
    pub tag_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub asset: ReleaseAsset,
}

impl<'a> OverlayDownload<'a> {
    pub(crate) fn new(
        source: Box<dyn ReleaseSource>,
        asset_picker: AssetPicker<'a>,
        reqwest_client: Client,
    ) -> OverlayDownload<'a> {
        OverlayDownload {
            source,
            asset_picker,
            reqwest_client,
        }
    }

    /// The platform this instance picks installers for.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.asset_picker.platform()
    }

    /// Fetches the latest release from the feed.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`](crate::FeedError) if the feed cannot be reached, answers with an
    /// error status, or returns something that is not a release.
    pub async fn latest_release(&self) -> Result<Release> {
        Ok(self.source.fetch_latest_release().await?)
    }

    /// Picks the installer for this platform from an already fetched release.
    #[must_use]
    pub fn asset_for<'r>(&self, release: &'r Release) -> Option<&'r ReleaseAsset> {
        self.asset_picker.pick_asset(&release.assets)
    }

    /// Fetches the latest release and picks the installer for this platform from it. Returns
    /// `Ok(None)` when the release has no compatible installer.
    ///
    /// # Errors
    ///
    /// Returns an error if the release cannot be fetched. See [`OverlayDownload::latest_release`].
    pub async fn latest_download(&self) -> Result<Option<LatestDownload>> {
        let release = self.latest_release().await?;
        let Some(asset) = self.asset_for(&release) else {
            info!(
                "release {} has no installer for {}",
                release.tag_name,
                self.platform()
            );
            return Ok(None);
        };
        let asset = asset.clone();

        Ok(Some(LatestDownload {
            tag_name: release.tag_name,
            published_at: release.published_at,
            asset,
        }))
    }

    /// Downloads `asset` into `dir`, creating the directory if needed, and returns the path of the
    /// downloaded file. The file is named after the asset, and only appears once the whole body has
    /// been received.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset name is not a plain file name, the request fails or gets a
    /// status other than 200, or the file cannot be written.
    pub async fn download_installer(&self, asset: &ReleaseAsset, dir: &Path) -> Result<PathBuf> {
        let file_name = asset.file_name().ok_or_else(|| {
            anyhow!(
                "refusing to download asset with a name that is not a plain file name: `{}`",
                asset.name
            )
        })?;
        debug!("downloading asset from {}", asset.download_url);

        let req = self
            .reqwest_client
            .get(asset.download_url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/octet-stream"))
            .build()
            .with_context(|| format!("failed to build HTTP request for {}", asset.download_url))?;

        let mut resp = self.reqwest_client.execute(req).await.with_context(|| {
            format!(
                "failed to execute HTTP request to download asset from {}",
                asset.download_url
            )
        })?;
        if resp.status() != StatusCode::OK {
            let mut msg = format!("error requesting {}: {}", asset.download_url, resp.status());
            if let Ok(t) = resp.text().await {
                msg.push('\n');
                msg.push_str(&t);
            }
            return Err(anyhow!(msg));
        }

        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
        let path = dir.join(file_name);
        debug!("download path is {}", path.display());

        // The body goes to a temp file next to the target, which is only renamed into place once
        // every chunk is written. A failed download leaves nothing behind.
        let mut downloaded_file = NamedTempFile::new_in(dir).with_context(|| {
            format!(
                "failed to create temp file in {} for downloaded asset",
                dir.display()
            )
        })?;
        while let Some(c) = resp.chunk().await.with_context(|| {
            format!(
                "failed to read chunk while downloading asset from {}",
                asset.download_url
            )
        })? {
            downloaded_file.write_all(c.as_ref()).with_context(|| {
                format!(
                    "failed to write chunk to {}",
                    downloaded_file.path().display()
                )
            })?;
        }
        downloaded_file
            .persist(&path)
            .with_context(|| format!("failed to move downloaded asset to {}", path.display()))?;

        info!("Downloaded {} into {}", asset.name, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedError;
    use async_trait::async_trait;
    use mockito::Server;
    use std::io;
    use tempfile::TempDir;
    use test_log::test;
    use url::Url;

    #[derive(Debug)]
    struct StaticSource(Result<Release, StatusCode>);

    #[async_trait]
    impl ReleaseSource for StaticSource {
        async fn fetch_latest_release(&self) -> Result<Release, FeedError> {
            self.0.clone().map_err(|status| FeedError::Unavailable {
                url: Url::parse("https://releases.example.com/latest").expect("valid URL"),
                status,
            })
        }
    }

    fn release(names: &[&str], base: &str) -> Result<Release> {
        Ok(Release {
            tag_name: "v0.4.1".to_string(),
            assets: names
                .iter()
                .map(|n| -> Result<ReleaseAsset> {
                    Ok(ReleaseAsset {
                        name: (*n).to_string(),
                        download_url: Url::parse(base)?.join(&format!("/download/{n}"))?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            published_at: None,
            html_url: None,
        })
    }

    fn overlay_download(source: StaticSource, platform: Platform) -> OverlayDownload<'static> {
        OverlayDownload::new(
            Box::new(source),
            AssetPicker::new(platform),
            Client::new(),
        )
    }

    #[test(tokio::test)]
    async fn latest_download_picks_platform_installer() -> Result<()> {
        let release = release(
            &[
                "Jutukuva.Subtiitrid_0.4.1_x64.exe",
                "Jutukuva.Subtiitrid_0.4.1.dmg",
                "Jutukuva.Subtiitrid_0.4.1.AppImage",
                "source.zip",
            ],
            "https://example.com",
        )?;
        let od = overlay_download(StaticSource(Ok(release)), Platform::MacOS);

        let download = od
            .latest_download()
            .await?
            .ok_or_else(|| anyhow!("expected a download"))?;
        assert_eq!(download.tag_name, "v0.4.1");
        assert_eq!(download.asset.name, "Jutukuva.Subtiitrid_0.4.1.dmg");
        assert_eq!(od.platform(), Platform::MacOS);

        Ok(())
    }

    #[test(tokio::test)]
    async fn latest_download_without_installer_is_none() -> Result<()> {
        let release = release(&["source.zip", "checksums.txt"], "https://example.com")?;
        let od = overlay_download(StaticSource(Ok(release)), Platform::Linux);
        assert_eq!(od.latest_download().await?, None);
        Ok(())
    }

    #[test(tokio::test)]
    async fn latest_download_propagates_feed_errors() -> Result<()> {
        let od = overlay_download(
            StaticSource(Err(StatusCode::SERVICE_UNAVAILABLE)),
            Platform::Windows,
        );
        let err = od
            .latest_download()
            .await
            .expect_err("feed error is an error");
        assert!(
            matches!(
                err.downcast_ref::<FeedError>(),
                Some(FeedError::Unavailable { .. })
            ),
            "{err:?}"
        );
        Ok(())
    }

    #[test(tokio::test)]
    async fn download_installer_writes_file() -> Result<()> {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/download/Jutukuva.Subtiitrid_0.4.1.AppImage")
            .match_header("Accept", "application/octet-stream")
            .with_status(200)
            .with_body("installer bytes")
            .create_async()
            .await;

        let release = release(&["Jutukuva.Subtiitrid_0.4.1.AppImage"], &server.url())?;
        let asset = release.assets[0].clone();
        let od = overlay_download(StaticSource(Ok(release)), Platform::Linux);

        let td = TempDir::new()?;
        let dir = td.path().join("downloads");
        let path = od.download_installer(&asset, &dir).await?;

        assert_eq!(path, dir.join("Jutukuva.Subtiitrid_0.4.1.AppImage"));
        assert_eq!(fs::read_to_string(&path)?, "installer bytes");
        m.assert_async().await;

        Ok(())
    }

    #[test(tokio::test)]
    async fn download_installer_error_status() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/download/Jutukuva.Subtiitrid_0.4.1.dmg")
            .with_status(404)
            .with_body("gone")
            .create_async()
            .await;

        let release = release(&["Jutukuva.Subtiitrid_0.4.1.dmg"], &server.url())?;
        let asset = release.assets[0].clone();
        let od = overlay_download(StaticSource(Ok(release)), Platform::MacOS);

        let td = TempDir::new()?;
        let err = od
            .download_installer(&asset, td.path())
            .await
            .expect_err("404 is an error");
        assert!(err.to_string().contains("404"), "{err}");
        assert!(!td.path().join("Jutukuva.Subtiitrid_0.4.1.dmg").exists());

        Ok(())
    }

    #[test(tokio::test)]
    async fn interrupted_download_leaves_no_file() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/download/Jutukuva.Subtiitrid_0.4.1_x64.exe")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(b"partial installer bytes")?;
                w.flush()?;
                Err(io::Error::other("connection dropped"))
            })
            .create_async()
            .await;

        let release = release(&["Jutukuva.Subtiitrid_0.4.1_x64.exe"], &server.url())?;
        let asset = release.assets[0].clone();
        let od = overlay_download(StaticSource(Ok(release)), Platform::Windows);

        let td = TempDir::new()?;
        let res = od.download_installer(&asset, td.path()).await;
        assert!(res.is_err(), "{res:?}");
        assert!(!td.path().join("Jutukuva.Subtiitrid_0.4.1_x64.exe").exists());
        assert_eq!(fs::read_dir(td.path())?.count(), 0);

        Ok(())
    }

    #[test(tokio::test)]
    async fn download_installer_rejects_path_names() -> Result<()> {
        let asset = ReleaseAsset {
            name: "../Jutukuva.Subtiitrid.exe".to_string(),
            download_url: Url::parse("https://example.com/x.exe")?,
        };
        let od = overlay_download(
            StaticSource(Err(StatusCode::NOT_FOUND)),
            Platform::Windows,
        );
        let td = TempDir::new()?;
        assert!(od.download_installer(&asset, td.path()).await.is_err());
        Ok(())
    }
}
