//! Release lookup, settings, and caption plumbing for the overlay captions app.
//!
//! The overlay captions app is a desktop companion for a collaborative captioning editor. It shows
//! live captions in a borderless, always-on-top window. This crate holds the parts of it that are
//! not about drawing windows:
//!
//! - Finding the right installer for a user's platform in the latest release.
//! - The one-way channel that carries caption text to the overlay's display surface.
//! - The settings schemas, with their defaults, and the settings file.
//! - The app state shared by the overlay's windows.
//!
//! The main entry point for finding an installer is the [`OverlayDownloadBuilder`] struct. Here is
//! an example of its usage:
//!
//! ```ignore
//! use overlay_captions::{OverlayDownloadBuilder, Platform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let download = OverlayDownloadBuilder::new()
//!         .platform(Platform::Windows)
//!         .build()?;
//!
//!     match download.latest_download().await? {
//!         Some(d) => println!("{} {}", d.tag_name, d.asset.download_url),
//!         None => println!("no compatible download available"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How the Installer Is Picked
//!
//! A release has installers for every platform, plus other files like source archives and
//! checksums. The picker works like this:
//!
//! - First it keeps only the assets whose name contains the product marker,
//!   `Jutukuva.Subtiitrid`.
//! - Then it returns the first of those, in release order, whose name ends with the installer
//!   suffix for the platform. This is `.exe` on Windows, `.dmg` on macOS, and `.AppImage` on Linux.
//!   The suffix is matched case-insensitively.
//!
//! If nothing matches, there is no compatible download. This is not an error. If more than one
//! asset matches, the first one wins.
//!
//! The platform comes from one of three places. You can set it explicitly, you can pass a browser
//! user agent to guess it from with [`detect_platform`], or it defaults to the platform this crate
//! was compiled for.
//!
//! ## Configuration
//!
//! The release feed URL can be overridden with the `OVERLAY_CAPTIONS_RELEASES_URL` env var, and the
//! collaboration server URL with `OVERLAY_CAPTIONS_SYNC_URL`. See [`Config`].
//!
//! ## Features
//!
//! This crate offers several features to control the TLS dependency used by `reqwest`:
//!
#![doc = document_features::document_features!()]

mod builder;
mod caption;
mod config;
mod download;
mod feed;
mod os;
mod picker;
mod platform;
mod release;
mod settings;
mod state;

pub use crate::{
    builder::OverlayDownloadBuilder,
    caption::{
        CaptionChannel, CaptionSubscription, CaptionSurface, CaptionUpdate, CAPTION_ELEMENT_ID,
    },
    config::{Config, ConfigError, RELEASES_URL_ENV_VAR, SYNC_URL_ENV_VAR},
    download::{LatestDownload, OverlayDownload},
    feed::{FeedError, ReleaseFeed, ReleaseSource, DEFAULT_RELEASES_URL},
    picker::{get_asset_for_platform, AssetPicker, PRODUCT_MARKER},
    platform::{detect_platform, Platform},
    release::{Release, ReleaseAsset},
    settings::{
        AppSettings, ConnectionSettings, DisplayMode, DisplaySettings, FontSettings,
        OverlaySettings, Position, PositionPreset, SettingsError, SettingsStore, Size, TextAlign,
        Theme, ViewMode, DEFAULT_SYNC_SERVER_URL,
    },
    state::{AppState, StateError},
};

// The version of the `overlay-captions` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};

/// This function initializes logging for the application. It's public for the sake of the
/// `overlay-captions` binary, but it lives in the library crate so that the desktop app can share
/// it.
///
/// # Errors
///
/// This can return a `log::SetLoggerError` error.
#[cfg(feature = "logging")]
pub fn init_logger(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let line_colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightBlack)
        .debug(Color::BrightBlack)
        .trace(Color::BrightBlack);
    let level_colors = line_colors.info(Color::Green).debug(Color::Black);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}[{target}][{level}{color_line}] {message}\x1B[0m",
                color_line = format_args!(
                    "\x1B[{}m",
                    line_colors.get_color(&record.level()).to_fg_str()
                ),
                target = record.target(),
                level = level_colors.color(record.level()),
                message = message,
            ));
        })
        .level(level)
        // These are very noisy.
        .level_for("hyper", log::LevelFilter::Error)
        .level_for("hyper_util", log::LevelFilter::Error)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
}
