//! Tab Registry (C4): map of tab-id to `TabInfo`, maintained from client frames.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{now_ms, TabInfo};

/// An upsert as received from a `tab_opened` / `tab_updated` frame.
/// `last_navigation_at` is only set when the frame carries an explicit
/// navigation timestamp; otherwise the registry infers one from a
/// session-id change.
#[derive(Debug, Clone)]
pub struct TabUpdate {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub session_id: String,
    pub is_active: bool,
    pub last_navigation_at: Option<i64>,
}

pub struct TabRegistry {
    tabs: Mutex<HashMap<i64, TabInfo>>,
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TabRegistry {
    pub fn new() -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
        }
    }

    /// Upsert a tab. Coalesces: if the resulting record is identical to what
    /// is already stored, the map is left untouched (spec §4.4).
    pub fn upsert(&self, update: TabUpdate) {
        let mut tabs = self.tabs.lock().unwrap();
        let now = now_ms();

        let last_navigation_at = match (&tabs.get(&update.id), update.last_navigation_at) {
            (_, Some(explicit)) => explicit,
            (Some(existing), None) if existing.session_id != update.session_id => now,
            (Some(existing), None) => existing.last_navigation_at,
            (None, None) => now,
        };

        let candidate = TabInfo {
            id: update.id,
            url: update.url,
            title: update.title,
            session_id: update.session_id,
            is_active: update.is_active,
            last_navigation_at,
        };

        if tabs.get(&update.id) == Some(&candidate) {
            return;
        }
        tabs.insert(update.id, candidate);
    }

    /// Create a minimal tab record when a log/net entry references an
    /// unknown tab (spec §4.4: "also update TabRegistry if the frame's tab
    /// is unknown").
    pub fn ensure_minimal(&self, tab_id: i64, session_id: &str, url: &str) {
        let mut tabs = self.tabs.lock().unwrap();
        if tabs.contains_key(&tab_id) {
            return;
        }
        tabs.insert(
            tab_id,
            TabInfo {
                id: tab_id,
                url: url.to_string(),
                title: String::new(),
                session_id: session_id.to_string(),
                is_active: false,
                last_navigation_at: now_ms(),
            },
        );
    }

    pub fn remove(&self, tab_id: i64) {
        self.tabs.lock().unwrap().remove(&tab_id);
    }

    pub fn get(&self, tab_id: i64) -> Option<TabInfo> {
        self.tabs.lock().unwrap().get(&tab_id).cloned()
    }

    pub fn list(&self) -> Vec<TabInfo> {
        self.tabs.lock().unwrap().values().cloned().collect()
    }
}
