#![forbid(unsafe_code)]

//! User-facing notifications for failed remote actions.
//!
//! The center is a bounded FIFO: when full, the oldest notification is
//! dropped to make room. Rendering and auto-dismiss timing belong to the UI;
//! this module only keeps the list and its counters.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Configuration for the notification center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Maximum number of notifications kept at once.
    pub max_queued: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { max_queued: 10 }
    }
}

impl NotificationConfig {
    /// Set maximum queued notifications.
    #[must_use]
    pub fn max_queued(mut self, max: usize) -> Self {
        self.max_queued = max;
        self
    }
}

/// Unique identifier for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

impl NotificationId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// One dismissible message naming the action it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub level: NotificationLevel,
    /// Label of the attempted action ("Reorder plan", "Undo").
    pub action: String,
    pub message: String,
}

/// Counters for monitoring and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationStats {
    /// Total notifications pushed.
    pub total_pushed: u64,
    /// Notifications dropped because the center was full.
    pub overflow_count: u64,
    /// Notifications dismissed by the user.
    pub user_dismissed: u64,
}

#[derive(Debug, Default)]
struct CenterState {
    queue: VecDeque<Notification>,
    next_id: u64,
    stats: NotificationStats,
}

/// Shared, bounded list of active notifications.
///
/// Cloning yields another handle to the same list.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    config: NotificationConfig,
    state: Arc<Mutex<CenterState>>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}

impl NotificationCenter {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(CenterState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a notification, evicting the oldest when full.
    pub fn push(
        &self,
        level: NotificationLevel,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> NotificationId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = NotificationId(state.next_id);
        state.stats.total_pushed += 1;

        let capacity = self.config.max_queued.max(1);
        while state.queue.len() >= capacity {
            state.queue.pop_front();
            state.stats.overflow_count += 1;
        }
        state.queue.push_back(Notification {
            id,
            level,
            action: action.into(),
            message: message.into(),
        });
        id
    }

    pub fn error(&self, action: impl Into<String>, message: impl Into<String>) -> NotificationId {
        self.push(NotificationLevel::Error, action, message)
    }

    pub fn info(&self, action: impl Into<String>, message: impl Into<String>) -> NotificationId {
        self.push(NotificationLevel::Info, action, message)
    }

    /// Dismiss one notification. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let mut state = self.lock();
        let before = state.queue.len();
        state.queue.retain(|notification| notification.id != id);
        let removed = state.queue.len() != before;
        if removed {
            state.stats.user_dismissed += 1;
        }
        removed
    }

    pub fn dismiss_all(&self) {
        let mut state = self.lock();
        let count = state.queue.len() as u64;
        state.queue.clear();
        state.stats.user_dismissed += count;
    }

    /// Snapshot of active notifications, oldest first.
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        self.lock().queue.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> NotificationStats {
        self.lock().stats.clone()
    }

    #[must_use]
    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }
}
