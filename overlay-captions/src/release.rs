use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// One published release, as described by the release feed.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Release {
    pub tag_name: String,
    /// The downloadable files attached to the release, in feed order.
    pub assets: Vec<ReleaseAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<Url>,
}

/// One downloadable file attached to a release.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: Url,
}

impl ReleaseAsset {
    /// Returns the asset name if it is safe to use as a file name, that is, it names a single path
    /// component.
    pub(crate) fn file_name(&self) -> Option<&str> {
        let name = self.name.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return None;
        }
        Some(name)
    }
}

/// Parses a release feed document, reporting where in the document a shape mismatch was found.
pub(crate) fn parse_release(
    body: &str,
) -> Result<Release, serde_path_to_error::Error<serde_json::Error>> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de)
}
