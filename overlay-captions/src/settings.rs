//! Settings for the overlay app and for the web viewer.
//!
//! Every settings group has exactly one canonical default, its `Default` impl. Stored settings are
//! merged over those defaults field by field, so a settings file written by an older version of the
//! app, or edited by hand, only needs the fields it wants to change. A field with a value that does
//! not fit, like an unknown theme name, falls back to its default without touching the rest of the
//! file.

use crate::{
    config::{Config, ConfigError},
    platform::Platform,
};
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_path_to_error::Segment;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use url::Url;

pub const DEFAULT_SYNC_SERVER_URL: &str = "wss://tekstiks.ee/kk";

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

// Stored `position` and `size` objects may be partial. Missing coordinates come from the overlay
// default, not from zero.
#[derive(Deserialize)]
struct PositionPatch {
    x: Option<i32>,
    y: Option<i32>,
}

#[derive(Deserialize)]
struct SizePatch {
    width: Option<u32>,
    height: Option<u32>,
}

fn position_over_default<'de, D>(deserializer: D) -> Result<Position, D::Error>
where
    D: Deserializer<'de>,
{
    let patch = PositionPatch::deserialize(deserializer)?;
    let default = OverlaySettings::default().position;
    Ok(Position {
        x: patch.x.unwrap_or(default.x),
        y: patch.y.unwrap_or(default.y),
    })
}

fn size_over_default<'de, D>(deserializer: D) -> Result<Size, D::Error>
where
    D: Deserializer<'de>,
{
    let patch = SizePatch::deserialize(deserializer)?;
    let default = OverlaySettings::default().size;
    Ok(Size {
        width: patch.width.unwrap_or(default.width),
        height: patch.height.unwrap_or(default.height),
    })
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PositionPreset {
    Top,
    #[default]
    Bottom,
    Custom,
}

/// How much of the transcript the overlay shows.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum DisplayMode {
    /// Only the most recent caption.
    #[default]
    LastOnly,
    /// As much of the transcript as fits.
    Full,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Whether the web viewer follows the live caption stream or shows the whole document.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ViewMode {
    #[default]
    Live,
    Document,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlaySettings {
    pub enabled: bool,
    #[serde(deserialize_with = "position_over_default")]
    pub position: Position,
    #[serde(deserialize_with = "size_over_default")]
    pub size: Size,
    pub position_preset: PositionPreset,
    pub opacity: f32,
    pub click_through: bool,
    pub always_on_top: bool,
    pub display_mode: DisplayMode,
    pub background_color: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            position: Position { x: 500, y: 600 },
            size: Size {
                width: 600,
                height: 160,
            },
            position_preset: PositionPreset::Bottom,
            opacity: 0.95,
            click_through: false,
            always_on_top: true,
            display_mode: DisplayMode::LastOnly,
            background_color: "#000000".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FontSettings {
    pub family: String,
    pub size: u32,
    pub weight: u32,
    pub color: String,
    pub align: TextAlign,
    pub line_height: f64,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            family: "Inter, system-ui, sans-serif".to_string(),
            size: 32,
            weight: 500,
            color: "#ffffff".to_string(),
            align: TextAlign::Justify,
            line_height: 1.3,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub yjs_server_url: String,
    pub auto_connect: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            yjs_server_url: DEFAULT_SYNC_SERVER_URL.to_string(),
            auto_connect: true,
        }
    }
}

/// Everything the overlay app persists between runs.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub overlay: OverlaySettings,
    pub font: FontSettings,
    pub connection: ConnectionSettings,
    pub last_session_code: Option<String>,
    pub theme: Theme,
}

/// How the web viewer renders the session transcript. This is unrelated to [`AppSettings`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    pub font_size: u32,
    pub font_weight: u32,
    pub text_color: String,
    pub background_color: String,
    pub text_align: TextAlign,
    pub view_mode: ViewMode,
    pub letter_spacing: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_size: 32,
            font_weight: 400,
            text_color: "#ffffff".to_string(),
            background_color: "#000000".to_string(),
            text_align: TextAlign::Left,
            view_mode: ViewMode::Live,
            letter_spacing: 0.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not write settings to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not serialize settings")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and writes [`AppSettings`] as pretty-printed JSON in a single file.
///
/// The store also owns the defaults that stored settings are merged over. These are
/// [`AppSettings::default`] unless the sync server URL was overridden.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsStore {
    path: PathBuf,
    defaults: AppSettings,
}

impl SettingsStore {
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            defaults: AppSettings::default(),
        }
    }

    /// A store in the desktop app's per-user config directory:
    ///
    /// - Linux: `~/.config/overlay-captions`
    /// - macOS: `~/Library/Application Support/ee.jutukuva.overlay-captions`
    /// - Windows: `%APPDATA%\jutukuva\overlay-captions\config`
    ///
    /// Falls back to `settings.json` in the current directory if there is no config directory.
    #[must_use]
    pub fn in_config_dir() -> Self {
        let path = dirs::config_dir().map_or_else(
            || PathBuf::from("settings.json"),
            |dir| settings_path_in(dir, Platform::current()),
        );
        debug!("settings path = {}", path.display());
        Self::new(path)
    }

    /// Uses `url` as the default sync server for settings that do not have one.
    #[must_use]
    pub fn with_sync_server_url(mut self, url: &Url) -> Self {
        url.as_str()
            .clone_into(&mut self.defaults.connection.yjs_server_url);
        self
    }

    /// Applies the overrides from the environment to this store's defaults. See [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error if [`SYNC_URL_ENV_VAR`](crate::SYNC_URL_ENV_VAR) is set to something that
    /// is not a URL.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let url = Config::sync_url_from_env()?;
        Ok(self.with_sync_server_url(&url))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The settings used for anything the stored file does not set.
    #[must_use]
    pub fn defaults(&self) -> &AppSettings {
        &self.defaults
    }

    /// Loads the stored settings merged over this store's defaults. A missing, unreadable, or
    /// unparseable file yields the defaults. Stored fields with invalid values are replaced by
    /// their defaults one at a time.
    #[must_use]
    pub fn load(&self) -> AppSettings {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {}, using defaults", self.path.display());
                return self.defaults.clone();
            }
            Err(e) => {
                warn!(
                    "could not read settings from {}, using defaults: {e}",
                    self.path.display()
                );
                return self.defaults.clone();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(stored) => self.merge_over_defaults(stored),
            Err(e) => {
                warn!(
                    "settings in {} are not valid JSON, using defaults: {e}",
                    self.path.display()
                );
                self.defaults.clone()
            }
        }
    }

    fn merge_over_defaults(&self, stored: Value) -> AppSettings {
        let defaults = match serde_json::to_value(&self.defaults) {
            Ok(v) => v,
            Err(e) => {
                warn!("could not serialize default settings: {e}");
                return self.defaults.clone();
            }
        };
        let mut merged = defaults.clone();
        merge_json(&mut merged, stored);

        // Every pass resets one field that differs from its default, so this ends.
        loop {
            let err = match serde_path_to_error::deserialize::<_, AppSettings>(&merged) {
                Ok(settings) => return settings,
                Err(e) => e,
            };

            let pointer = json_pointer(err.path()).filter(|p| !p.is_empty());
            let default = pointer.as_deref().and_then(|p| defaults.pointer(p));
            let slot = pointer.as_deref().and_then(|p| merged.pointer_mut(p));
            match (default, slot) {
                (Some(default), Some(slot)) if slot != default => {
                    warn!(
                        "setting `{}` in {} is invalid, using its default: {}",
                        err.path(),
                        self.path.display(),
                        err.inner(),
                    );
                    *slot = default.clone();
                }
                (Some(_) | None, Some(_) | None) => {
                    warn!(
                        "settings in {} are malformed, using defaults: {err}",
                        self.path.display()
                    );
                    return self.defaults.clone();
                }
            }
        }
    }

    /// Writes the settings, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or the file cannot be written.
    pub fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, content).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}

// The same layout the desktop app gets from its project directories.
fn settings_path_in(mut config_dir: PathBuf, platform: Platform) -> PathBuf {
    match platform {
        Platform::Linux => config_dir.push("overlay-captions"),
        Platform::MacOS => config_dir.push("ee.jutukuva.overlay-captions"),
        Platform::Windows => {
            config_dir.push("jutukuva");
            config_dir.push("overlay-captions");
            config_dir.push("config");
        }
    }
    config_dir.push("settings.json");
    config_dir
}

// Objects are merged key by key. Anything else in `patch` replaces what is in `base`.
fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

fn json_pointer(path: &serde_path_to_error::Path) -> Option<String> {
    path.iter()
        .map(|segment| match segment {
            Segment::Map { key } => Some(format!(
                "/{}",
                key.replace('~', "~0").replace('/', "~1")
            )),
            Segment::Seq { index } => Some(format!("/{index}")),
            Segment::Enum { .. } | Segment::Unknown => None,
        })
        .collect()
}
