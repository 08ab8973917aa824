//! The caption display surface and the one-way channel that feeds it.
//!
//! The host process pushes caption text with [`CaptionChannel::broadcast_caption`]. Each rendering
//! surface subscribes to the channel when it starts and unsubscribes when it is torn down. There
//! are no replies and no acknowledgements. A caption that a slow surface misses is simply
//! superseded by the next one.

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};

/// The identifier of the element that shows the caption text.
pub const CAPTION_ELEMENT_ID: &str = "caption-text";

const CHANNEL_CAPACITY: usize = 16;
const LOGGED_CAPTION_CHARS: usize = 50;

/// The only message the channel carries.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct CaptionUpdate {
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct CaptionChannel {
    sender: broadcast::Sender<CaptionUpdate>,
}

impl CaptionChannel {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Sends the caption text to every subscribed surface and returns how many surfaces were
    /// subscribed. Sending with no subscribers is not an error.
    pub fn broadcast_caption<S: Into<String>>(&self, text: S) -> usize {
        let text = text.into();
        info!(
            "Broadcasting caption: {}",
            text.chars().take(LOGGED_CAPTION_CHARS).collect::<String>()
        );
        match self.sender.send(CaptionUpdate { text }) {
            Ok(n) => n,
            Err(_) => {
                debug!("no caption surfaces are subscribed");
                0
            }
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn receiver(&self) -> broadcast::Receiver<CaptionUpdate> {
        self.sender.subscribe()
    }
}

impl Default for CaptionChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A rendering surface made of text elements looked up by identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptionSurface {
    elements: HashMap<String, String>,
}

impl CaptionSurface {
    /// Returns a surface with no elements at all.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a surface with an empty caption element.
    #[must_use]
    pub fn with_caption_element() -> Self {
        let mut surface = Self::new();
        surface.add_element(CAPTION_ELEMENT_ID, "");
        surface
    }

    pub fn add_element<I: Into<String>, T: Into<String>>(&mut self, id: I, text: T) {
        self.elements.insert(id.into(), text.into());
    }

    pub fn remove_element(&mut self, id: &str) -> Option<String> {
        self.elements.remove(id)
    }

    #[must_use]
    pub fn text(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(String::as_str)
    }

    /// The text currently shown in the caption element, if there is one.
    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.text(CAPTION_ELEMENT_ID)
    }

    /// Replaces the caption element's text with `text`. If the surface has no caption element this
    /// does nothing.
    pub fn update_caption(&mut self, text: &str) {
        if let Some(element) = self.elements.get_mut(CAPTION_ELEMENT_ID) {
            text.clone_into(element);
        } else {
            debug!("no `{CAPTION_ELEMENT_ID}` element, ignoring caption update");
        }
    }

    /// Starts applying every caption sent on `channel` to `surface`. Updates stop when the
    /// returned subscription is dropped or [`CaptionSubscription::unsubscribe`] is called.
    ///
    /// This must be called from within a Tokio runtime.
    #[must_use = "dropping the subscription unsubscribes the surface"]
    pub fn subscribe(
        surface: Arc<Mutex<CaptionSurface>>,
        channel: &CaptionChannel,
    ) -> CaptionSubscription {
        let mut rx = channel.receiver();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(update) => match surface.lock() {
                        Ok(mut s) => s.update_caption(&update.text),
                        Err(e) => {
                            error!("caption surface lock is poisoned, unsubscribing: {e}");
                            break;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("surface fell behind, skipped {skipped} superseded captions");
                    }
                    Err(RecvError::Closed) => {
                        debug!("caption channel closed");
                        break;
                    }
                }
            }
        });

        CaptionSubscription { handle }
    }
}

#[derive(Debug)]
pub struct CaptionSubscription {
    handle: JoinHandle<()>,
}

impl CaptionSubscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for CaptionSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
