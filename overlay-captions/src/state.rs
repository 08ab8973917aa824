use crate::{
    caption::CaptionChannel,
    settings::{AppSettings, Position, SettingsError, SettingsStore, Size},
};
use log::{debug, info};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("the {0} lock is poisoned")]
    Poisoned(&'static str),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// The state shared by every window of the overlay app: the current settings, whether the overlay
/// is showing, and the channel that carries captions to the overlay.
#[derive(Debug)]
pub struct AppState {
    settings: Mutex<AppSettings>,
    overlay_visible: Mutex<bool>,
    store: SettingsStore,
    captions: CaptionChannel,
}

impl AppState {
    /// Creates the state with the settings loaded from `store`. The overlay starts hidden. Use
    /// [`SettingsStore::with_env_overrides`] first to apply the sync server override.
    #[must_use]
    pub fn load(store: SettingsStore) -> Self {
        let settings = store.load();
        Self::new(store, settings)
    }

    #[must_use]
    pub fn new(store: SettingsStore, settings: AppSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            overlay_visible: Mutex::new(false),
            store,
            captions: CaptionChannel::new(),
        }
    }

    #[must_use]
    pub fn captions(&self) -> &CaptionChannel {
        &self.captions
    }

    /// Returns a copy of the current settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn settings(&self) -> Result<AppSettings, StateError> {
        Ok(self.lock_settings()?.clone())
    }

    /// Replaces the current settings and writes them to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned or the settings cannot be saved.
    pub fn save_settings(&self, new_settings: AppSettings) -> Result<(), StateError> {
        let mut settings = self.lock_settings()?;
        *settings = new_settings;
        self.store.save(&settings)?;
        Ok(())
    }

    /// Replaces the current settings with the store's defaults, writes them to the store, and
    /// returns them.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned or the settings cannot be saved.
    pub fn reset_settings(&self) -> Result<AppSettings, StateError> {
        let mut settings = self.lock_settings()?;
        *settings = self.store.defaults().clone();
        self.store.save(&settings)?;
        info!("settings reset to defaults");
        Ok(settings.clone())
    }

    /// # Errors
    ///
    /// Returns an error if the visibility lock is poisoned.
    pub fn show_overlay(&self) -> Result<(), StateError> {
        self.set_overlay_visible(true)
    }

    /// # Errors
    ///
    /// Returns an error if the visibility lock is poisoned.
    pub fn hide_overlay(&self) -> Result<(), StateError> {
        self.set_overlay_visible(false)
    }

    /// Records that the overlay window was closed rather than hidden. The overlay is not visible
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the visibility lock is poisoned.
    pub fn close_overlay(&self) -> Result<(), StateError> {
        self.set_overlay_visible(false)?;
        info!("overlay closed");
        Ok(())
    }

    /// Flips the overlay visibility and returns whether the overlay is now visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the visibility lock is poisoned.
    pub fn toggle_overlay(&self) -> Result<bool, StateError> {
        let mut visible = self.lock_visible()?;
        *visible = !*visible;
        debug!("overlay visible = {}", *visible);
        Ok(*visible)
    }

    /// # Errors
    ///
    /// Returns an error if the visibility lock is poisoned.
    pub fn is_overlay_visible(&self) -> Result<bool, StateError> {
        Ok(*self.lock_visible()?)
    }

    /// Records where the overlay window now is. This is not written to the store until the next
    /// save.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn set_overlay_position(&self, x: i32, y: i32) -> Result<(), StateError> {
        self.lock_settings()?.overlay.position = Position { x, y };
        Ok(())
    }

    /// Records the overlay window's new size. This is not written to the store until the next
    /// save.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn set_overlay_size(&self, width: u32, height: u32) -> Result<(), StateError> {
        self.lock_settings()?.overlay.size = Size { width, height };
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn set_click_through(&self, enabled: bool) -> Result<(), StateError> {
        self.lock_settings()?.overlay.click_through = enabled;
        Ok(())
    }

    /// Remembers the session code so the next run can offer to rejoin it, and saves the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned or the settings cannot be saved.
    pub fn set_last_session_code(&self, code: Option<String>) -> Result<(), StateError> {
        let mut settings = self.lock_settings()?;
        settings.last_session_code = code;
        self.store.save(&settings)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn last_session_code(&self) -> Result<Option<String>, StateError> {
        Ok(self.lock_settings()?.last_session_code.clone())
    }

    /// Sends caption text to every subscribed caption surface.
    pub fn broadcast_caption<S: Into<String>>(&self, text: S) {
        self.captions.broadcast_caption(text);
    }

    fn set_overlay_visible(&self, visible: bool) -> Result<(), StateError> {
        *self.lock_visible()? = visible;
        debug!("overlay visible = {visible}");
        Ok(())
    }

    fn lock_settings(&self) -> Result<MutexGuard<'_, AppSettings>, StateError> {
        self.settings
            .lock()
            .map_err(|_| StateError::Poisoned("settings"))
    }

    fn lock_visible(&self) -> Result<MutexGuard<'_, bool>, StateError> {
        self.overlay_visible
            .lock()
            .map_err(|_| StateError::Poisoned("overlay visibility"))
    }
}
