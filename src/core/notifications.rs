//! User-visible flash notifications
//!
//! Forms emit [`Notification`]s through the [`Notifier`] port. [`FlashMessages`]
//! keeps them per recipient until the next response drains them.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::profile::ports::Notifier;

/// Maximum number of pending notifications kept per user
const MAX_PENDING: usize = 20;

/// Notification severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    #[display("success")]
    Success,
}

/// A message addressed to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Uuid,
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(recipient: Uuid, message: impl Into<String>) -> Self {
        Self {
            recipient,
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }
}

/// Per-user flash queue
#[derive(Debug, Default)]
pub struct FlashMessages {
    pending: DashMap<Uuid, Vec<Notification>>,
}

impl FlashMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every pending notification for a user
    pub fn take(&self, user_id: Uuid) -> Vec<Notification> {
        self.pending
            .remove(&user_id)
            .map(|(_, notifications)| notifications)
            .unwrap_or_default()
    }

    /// Number of pending notifications for a user
    pub fn pending(&self, user_id: Uuid) -> usize {
        self.pending.get(&user_id).map(|n| n.len()).unwrap_or(0)
    }
}

impl Notifier for FlashMessages {
    fn notify(&self, notification: Notification) {
        tracing::debug!(
            recipient = %notification.recipient,
            level = %notification.level,
            "Flash: {}",
            notification.message
        );

        let mut queue = self.pending.entry(notification.recipient).or_default();
        if queue.len() >= MAX_PENDING {
            queue.remove(0);
        }
        queue.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_drains_only_recipient() {
        let flash = FlashMessages::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        flash.notify(Notification::success(alice, "Profile saved!"));
        flash.notify(Notification::success(bob, "Hello"));

        let taken = flash.take(alice);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].message, "Profile saved!");
        assert!(flash.take(alice).is_empty());
        assert_eq!(flash.pending(bob), 1);
    }

    #[test]
    fn test_queue_is_bounded() {
        let flash = FlashMessages::new();
        let user = Uuid::new_v4();

        for i in 0..(MAX_PENDING + 5) {
            flash.notify(Notification::success(user, format!("message {}", i)));
        }

        let taken = flash.take(user);
        assert_eq!(taken.len(), MAX_PENDING);
        assert_eq!(taken[0].message, "message 5");
    }

    #[test]
    fn test_level_serialization() {
        let json = serde_json::to_string(&NotificationLevel::Success).unwrap();
        assert_eq!(json, "\"success\"");
        assert_eq!(NotificationLevel::Success.to_string(), "success");
    }
}
