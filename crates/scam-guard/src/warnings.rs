//! Bounded list of warnings for a UI to render.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{NotificationBus, Subscription};

/// How many warnings a feed keeps by default.
pub const DEFAULT_WARNING_CAP: usize = 3;

/// A warning as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub id: Uuid,
    pub message: String,
}

/// The most recent warnings, oldest evicted first.
#[derive(Debug, Clone)]
pub struct WarningFeed {
    cap: usize,
    items: Arc<Mutex<VecDeque<Warning>>>,
}

impl Default for WarningFeed {
    fn default() -> Self {
        Self::with_cap(DEFAULT_WARNING_CAP)
    }
}

impl WarningFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// A feed holding at most `cap` warnings (at least one).
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            items: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Start collecting warnings emitted on `bus`.
    pub fn attach(&self, bus: &NotificationBus) -> Subscription {
        let feed = self.clone();
        bus.subscribe(move |message| {
            feed.push(message);
            Ok(())
        })
    }

    /// Add a warning, evicting the oldest when full.
    pub fn push(&self, message: &str) -> Warning {
        let warning = Warning {
            id: Uuid::new_v4(),
            message: message.to_string(),
        };

        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        while items.len() >= self.cap {
            items.pop_front();
        }
        items.push_back(warning.clone());

        warning
    }

    /// Remove a warning the user dismissed.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|w| w.id != id);
        items.len() != before
    }

    /// Current warnings, oldest first.
    pub fn snapshot(&self) -> Vec<Warning> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
