//! Notification hub
//!
//! Short-lived toasts. Each one may carry a lifetime after which a
//! scheduled task removes it; dismissing early cancels that task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use aroma_core::Clock;

use crate::lock;

/// Lifetime used by the shorthands when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Wall-clock millis at creation, bumped to stay unique
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Zero means the notification stays until dismissed
    pub ttl: Duration,
}

#[derive(Default)]
struct Queue {
    items: Vec<Notification>,
    last_id: i64,
}

struct Inner {
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    queue: Mutex<Queue>,
    timers: Mutex<HashMap<i64, JoinHandle<()>>>,
}

impl Inner {
    fn remove(&self, id: i64) -> bool {
        let removed = {
            let mut queue = lock(&self.queue);
            let before = queue.items.len();
            queue.items.retain(|n| n.id != id);
            queue.items.len() != before
        };
        if let Some(handle) = lock(&self.timers).remove(&id) {
            handle.abort();
        }
        removed
    }
}

#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<Inner>,
}

impl NotificationHub {
    pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                default_ttl,
                queue: Mutex::new(Queue::default()),
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queue a notification and return its id.
    ///
    /// Must be called inside a tokio runtime when `ttl` is non-zero.
    pub fn add(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        ttl: Duration,
    ) -> i64 {
        let now = self.inner.clock.now_millis();
        let notification = {
            let mut queue = lock(&self.inner.queue);
            let id = now.max(queue.last_id + 1);
            queue.last_id = id;
            let notification = Notification {
                id,
                kind,
                title: title.into(),
                message: message.into(),
                ttl,
            };
            queue.items.push(notification.clone());
            notification
        };

        debug!(
            id = notification.id,
            kind = ?notification.kind,
            title = %notification.title,
            "Notification added"
        );

        if !ttl.is_zero() {
            let id = notification.id;
            let weak = Arc::downgrade(&self.inner);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(inner) = weak.upgrade() {
                    inner.remove(id);
                }
            });
            lock(&self.inner.timers).insert(id, handle);
        }
        notification.id
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> i64 {
        self.add(NotificationKind::Success, title, message, self.inner.default_ttl)
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> i64 {
        self.add(NotificationKind::Error, title, message, self.inner.default_ttl)
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> i64 {
        self.add(NotificationKind::Warning, title, message, self.inner.default_ttl)
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> i64 {
        self.add(NotificationKind::Info, title, message, self.inner.default_ttl)
    }

    /// Dismiss a notification. Unknown ids are ignored.
    pub fn remove(&self, id: i64) {
        if self.inner.remove(id) {
            debug!(id, "Notification removed");
        }
    }

    /// Empty the queue. Pending removals stay scheduled and find nothing.
    pub fn clear(&self) {
        lock(&self.inner.queue).items.clear();
    }

    /// Current notifications, oldest first
    pub fn list(&self) -> Vec<Notification> {
        lock(&self.inner.queue).items.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.queue).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every scheduled removal
    pub fn dispose(&self) {
        for (_, handle) in lock(&self.inner.timers).drain() {
            handle.abort();
        }
    }
}
