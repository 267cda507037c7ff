//! Transient user notifications.
//!
//! Every notification is addressed to the user whose action produced it.
//! The channel is bounded: when nobody collects notifications the newest
//! ones are dropped, and each user's inbox keeps only its latest entries.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Notifications buffered in the channel before new ones are dropped.
pub const CHANNEL_CAPACITY: usize = 256;

/// Undelivered notifications kept per user.
pub const INBOX_CAPACITY: usize = 32;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A toast-style message for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Id of the user the message is for.
    #[serde(skip)]
    pub recipient: String,
    pub level: NotificationLevel,
    pub message: String,
}

/// Sending half of the notification channel.
///
/// Cheap to clone. Sending never fails or blocks; a full channel or a
/// closed receiver only gets logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::Sender<Notification>,
    unread: Arc<AtomicUsize>,
}

/// Receiving half of the notification channel.
#[derive(Debug)]
pub struct NotificationReceiver {
    receiver: mpsc::Receiver<Notification>,
    inboxes: BTreeMap<String, VecDeque<Notification>>,
    inbox_capacity: usize,
    unread: Arc<AtomicUsize>,
}

/// Creates a connected notifier/receiver pair with the default capacities.
#[must_use]
pub fn notification_channel() -> (Notifier, NotificationReceiver) {
    bounded_notification_channel(CHANNEL_CAPACITY, INBOX_CAPACITY)
}

/// Creates a connected pair holding at most `capacity` queued notifications
/// and `inbox_capacity` undelivered ones per user.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn bounded_notification_channel(
    capacity: usize,
    inbox_capacity: usize,
) -> (Notifier, NotificationReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let unread = Arc::new(AtomicUsize::new(0));
    (
        Notifier {
            sender,
            unread: unread.clone(),
        },
        NotificationReceiver {
            receiver,
            inboxes: BTreeMap::new(),
            inbox_capacity,
            unread,
        },
    )
}

impl Notifier {
    pub fn send(&self, recipient: &str, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            recipient: recipient.to_string(),
            level,
            message: message.into(),
        };
        match level {
            NotificationLevel::Error => log::warn!("[{recipient}] {}", notification.message),
            NotificationLevel::Info | NotificationLevel::Success => {
                log::info!("[{recipient}] {}", notification.message);
            }
        }
        match self.sender.try_send(notification) {
            Ok(()) => {
                self.unread.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(dropped)) => {
                log::warn!("Notification queue full, dropping: {}", dropped.message);
            }
            Err(TrySendError::Closed(_)) => log::debug!("Notification receiver closed"),
        }
    }

    pub fn info(&self, recipient: &str, message: impl Into<String>) {
        self.send(recipient, NotificationLevel::Info, message);
    }

    pub fn success(&self, recipient: &str, message: impl Into<String>) {
        self.send(recipient, NotificationLevel::Success, message);
    }

    pub fn error(&self, recipient: &str, message: impl Into<String>) {
        self.send(recipient, NotificationLevel::Error, message);
    }

    /// Number of queued or held notifications not yet delivered.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.unread.load(Ordering::Relaxed)
    }
}

impl NotificationReceiver {
    /// Waits for the next notification for anyone. Returns `None` once
    /// every [`Notifier`] is dropped.
    pub async fn recv(&mut self) -> Option<Notification> {
        let notification = self.receiver.recv().await?;
        self.unread.fetch_sub(1, Ordering::Relaxed);
        Some(notification)
    }

    /// Returns and clears everything addressed to `recipient`.
    pub fn drain_for(&mut self, recipient: &str) -> Vec<Notification> {
        while let Ok(notification) = self.receiver.try_recv() {
            let inbox = self
                .inboxes
                .entry(notification.recipient.clone())
                .or_default();
            inbox.push_back(notification);
            if inbox.len() > self.inbox_capacity {
                inbox.pop_front();
                self.unread.fetch_sub(1, Ordering::Relaxed);
            }
        }

        let delivered: Vec<_> = self
            .inboxes
            .remove(recipient)
            .map(Vec::from)
            .unwrap_or_default();
        self.unread.fetch_sub(delivered.len(), Ordering::Relaxed);
        delivered
    }
}
