//! Non-fatal notices surfaced to clients

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oldest notices are dropped beyond this many
const MAX_NOTICES: usize = 50;

/// A recoverable failure the user should be told about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Which part of the system raised it: "timers", "history" or "export"
    pub component: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Shared, bounded list of notices
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    inner: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notice for `component`
    pub fn push(&self, component: &str, message: impl Into<String>) {
        let notice = Notice {
            component: component.to_string(),
            message: message.into(),
            at: Utc::now(),
        };
        tracing::warn!("Notice [{}]: {}", notice.component, notice.message);

        if let Ok(mut notices) = self.inner.lock() {
            notices.push(notice);
            if notices.len() > MAX_NOTICES {
                let excess = notices.len() - MAX_NOTICES;
                notices.drain(..excess);
            }
        }
    }

    /// Drop every notice raised by `component`
    pub fn clear_for(&self, component: &str) {
        if let Ok(mut notices) = self.inner.lock() {
            let initial_count = notices.len();
            notices.retain(|n| n.component != component);

            if notices.len() != initial_count {
                tracing::info!(
                    "Cleared {} notices for component: {}",
                    initial_count - notices.len(),
                    component
                );
            }
        }
    }

    pub fn list(&self) -> Vec<Notice> {
        self.inner.lock().map(|n| n.clone()).unwrap_or_default()
    }
}
