//! Notification services.

use std::sync::Mutex;
use std::sync::PoisonError;

use tracing::error;
use tracing::info;

/// A fire-and-forget sink for user facing messages.
pub trait NotificationService: Send + Sync {
    /// Shows a message with an optional detail.
    fn show(&self, message: &str, detail: Option<&str>, is_error: bool);
}

/// A notification service that writes to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl NotificationService for Log {
    fn show(&self, message: &str, detail: Option<&str>, is_error: bool) {
        let detail = detail.unwrap_or_default();

        if is_error {
            error!("{message} {detail}");
        } else {
            info!("{message} {detail}");
        }
    }
}

/// A message that was shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// The message.
    pub message: String,

    /// The detail, if any.
    pub detail: Option<String>,

    /// Whether the message reports an error.
    pub is_error: bool,
}

/// A notification service that keeps every message shown.
#[derive(Debug, Default)]
pub struct Recorder {
    /// The messages shown so far.
    notices: Mutex<Vec<Notice>>,
}

impl Recorder {
    /// Gets the messages shown so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationService for Recorder {
    fn show(&self, message: &str, detail: Option<&str>, is_error: bool) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                message: message.to_string(),
                detail: detail.map(String::from),
                is_error,
            });
    }
}
