//! Popup and icon forwarded to the host as notifications
//!
//! The daemon has no window of its own. Whatever drives it receives one notification per side
//! effect and renders it.

use async_trait::async_trait;
use confirm_common::{Error, IconUpdater, PopupController};
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn notify(output: &mpsc::UnboundedSender<Value>, notification: Value) -> Result<(), Error> {
    output
        .send(notification)
        .map_err(|_| Error::Custom("Output channel closed".to_owned()))
}

/// Popup whose calls become `popup` notifications
#[derive(Debug, Clone)]
pub struct NotifyingPopup {
    output: mpsc::UnboundedSender<Value>,
}

impl NotifyingPopup {
    /// Notifications are written to `output`
    pub fn new(output: mpsc::UnboundedSender<Value>) -> Self {
        Self { output }
    }

    fn action(&self, action: &str) -> Result<(), Error> {
        notify(&self.output, json!({ "event": "popup", "action": action }))
            .map_err(|err| Error::Popup(err.to_string()))
    }
}

#[async_trait]
impl PopupController for NotifyingPopup {
    async fn open(&self) -> Result<(), Error> {
        self.action("open")
    }

    async fn focus_existing(&self) -> Result<(), Error> {
        self.action("focus")
    }

    async fn close(&self) -> Result<(), Error> {
        self.action("close")
    }
}

/// Icon whose updates become `icon` notifications
#[derive(Debug, Clone)]
pub struct NotifyingIcon {
    output: mpsc::UnboundedSender<Value>,
}

impl NotifyingIcon {
    /// Notifications are written to `output`
    pub fn new(output: mpsc::UnboundedSender<Value>) -> Self {
        Self { output }
    }
}

#[async_trait]
impl IconUpdater for NotifyingIcon {
    async fn update(&self, pending: usize) -> Result<(), Error> {
        notify(&self.output, json!({ "event": "icon", "pending": pending }))
            .map_err(|err| Error::Icon(err.to_string()))
    }
}
