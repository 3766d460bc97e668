//! Notification dispatch boundary.
//!
//! Delivery is best effort. A failing notifier is logged and ignored; it can
//! never undo or fail the transition that produced the event.

use crate::event::{ComplaintEvent, Notification};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. The default when nothing else is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, n: &Notification) -> Result<(), NotifyError> {
        log::info!(
            "notify [{}] {} -> {:?}: {}",
            n.tracking_code,
            n.title,
            n.recipients,
            n.body
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, n: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(n.clone());
        Ok(())
    }
}

/// Notifier that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn dispatch(&self, _: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("mail relay down".into()))
    }
}

/// Build and hand off the notification for `event`, swallowing failures.
pub fn dispatch_best_effort(notifier: &dyn Notifier, event: &ComplaintEvent, admins: &[String]) {
    let notification = event.notification(admins);
    if let Err(e) = notifier.dispatch(&notification) {
        log::warn!(
            "Dropped {} notification for complaint {}: {e}",
            event.name(),
            notification.tracking_code
        );
    }
}
