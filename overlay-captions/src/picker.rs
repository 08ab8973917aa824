use crate::{
    os::{linux_installer_re, macos_installer_re, windows_installer_re},
    platform::Platform,
    release::ReleaseAsset,
};
use itertools::Itertools;
use lazy_regex::Lazy;
use log::debug;
use regex::Regex;

/// The substring that every overlay captions installer has in its file name. Releases also carry
/// other artifacts, like source archives and checksums, which do not have it.
pub const PRODUCT_MARKER: &str = "Jutukuva.Subtiitrid";

/// Picks the installer for one platform out of a release's assets.
#[derive(Clone, Debug)]
pub struct AssetPicker<'a> {
    marker: &'a str,
    platform: Platform,
}

impl AssetPicker<'static> {
    /// Returns a picker that looks for overlay captions installers for the given platform.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            marker: PRODUCT_MARKER,
            platform,
        }
    }
}

impl<'a> AssetPicker<'a> {
    /// Returns a picker that looks for installers with a different product marker in their name.
    #[must_use]
    pub fn with_marker(marker: &'a str, platform: Platform) -> Self {
        Self { marker, platform }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        self.marker
    }

    /// Returns the first asset, in the order given, whose name contains the product marker and
    /// ends with this platform's installer suffix. Returns `None` when there is no such asset.
    #[must_use]
    pub fn pick_asset<'b>(&self, assets: &'b [ReleaseAsset]) -> Option<&'b ReleaseAsset> {
        debug!(
            "picking an asset for {} from {}",
            self.platform,
            assets.iter().map(|a| a.name.as_str()).join(", "),
        );

        let candidates = self.product_matches(assets);
        if candidates.is_empty() {
            debug!(
                "no asset names contain the product marker `{}`",
                self.marker
            );
            return None;
        }

        let installer_matcher = self.installer_matcher();
        debug!(
            "matching asset names against the installer suffix using {}",
            installer_matcher.as_str(),
        );

        // This could be a single `.find()`, but then there's no place to put the debugging output.
        for asset in candidates {
            debug!("matching installer suffix against asset name = {}", asset.name);
            if installer_matcher.is_match(&asset.name) {
                debug!("picked asset named {}", asset.name);
                return Some(asset);
            }
            debug!("does not match the installer suffix for {}", self.platform);
        }

        debug!("no installer for {} in this release", self.platform);
        None
    }

    fn product_matches<'b>(&self, assets: &'b [ReleaseAsset]) -> Vec<&'b ReleaseAsset> {
        assets
            .iter()
            .filter(|a| {
                if a.name.contains(self.marker) {
                    true
                } else {
                    debug!("skipping asset without the product marker, `{}`", a.name);
                    false
                }
            })
            .collect()
    }

    fn installer_matcher(&self) -> &'static Lazy<Regex> {
        match self.platform {
            Platform::Windows => windows_installer_re(),
            Platform::MacOS => macos_installer_re(),
            Platform::Linux => linux_installer_re(),
        }
    }
}

/// Returns the overlay captions installer for `platform` from a release's assets, or `None` if the
/// release has no compatible download. When more than one asset matches, the first one wins.
#[must_use]
pub fn get_asset_for_platform(
    assets: &[ReleaseAsset],
    platform: Platform,
) -> Option<&ReleaseAsset> {
    AssetPicker::new(platform).pick_asset(assets)
}
