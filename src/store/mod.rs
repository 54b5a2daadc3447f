//! Bounded Ordered Store (C1): a generic time-ordered ring with a max-size
//! cap and TTL eviction, a per-tab secondary index, latest-session-per-tab
//! bookkeeping, and per-entry subscription fan-out.
//!
//! `LogStore` and `NetStore` (see [`crate::store::log`] / [`crate::store::net`])
//! are both thin type aliases over [`BoundedOrderedStore`].

pub mod log;
pub mod net;
#[cfg(test)]
mod proptests;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::filter::StoreFilter;
use crate::model::{now_ms, StoreEntry};

/// Aggregate counts returned by `Stats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub per_tab: HashMap<i64, usize>,
    pub tabs: Vec<i64>,
}

/// Parameters for a bounded `Clear` — without a filter, everything is
/// dropped; with one, only entries matching `tab_id` older than `before`
/// are dropped (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct ClearFilter {
    pub tab_id: Option<i64>,
    pub before: Option<String>,
}

pub type Sink<E> = Box<dyn Fn(&E) + Send + Sync>;

struct Subscription<E, F> {
    id: u64,
    filter: F,
    sink: Sink<E>,
}

/// Opaque handle returned by `subscribe`, used only to unsubscribe.
pub struct SubscriptionHandle(u64);

struct Inner<E, F> {
    ring: VecDeque<Arc<E>>,
    tab_index: HashMap<i64, VecDeque<Arc<E>>>,
    latest_session: HashMap<i64, String>,
    subscriptions: Vec<Subscription<E, F>>,
}

pub struct BoundedOrderedStore<E, F> {
    max_entries: usize,
    ttl: Option<Duration>,
    next_sub_id: AtomicU64,
    inner: Mutex<Inner<E, F>>,
}

impl<E, F> BoundedOrderedStore<E, F>
where
    E: StoreEntry,
    F: StoreFilter<E>,
{
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            max_entries,
            ttl,
            next_sub_id: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                ring: VecDeque::new(),
                tab_index: HashMap::new(),
                latest_session: HashMap::new(),
                subscriptions: Vec::new(),
            }),
        }
    }

    /// Append-only insert. Runs lazy TTL cleanup, evicts the oldest entry on
    /// overflow, maintains the per-tab index and latest-session bookkeeping,
    /// and fans out to matching subscribers.
    pub fn add(&self, entry: E) {
        let now = now_ms();
        let mut inner = self.inner.lock().unwrap();
        Self::evict_expired(&mut inner, self.ttl, now);

        let tab_id = entry.tab_id();
        let arc = Arc::new(entry);

        inner.ring.push_back(arc.clone());
        inner
            .tab_index
            .entry(tab_id)
            .or_default()
            .push_back(arc.clone());

        let session_changed = inner
            .latest_session
            .get(&tab_id)
            .map(|s| s != arc.session_id())
            .unwrap_or(true);
        if session_changed {
            inner
                .latest_session
                .insert(tab_id, arc.session_id().to_string());
        }

        if inner.ring.len() > self.max_entries {
            Self::evict_front(&mut inner);
        }

        for sub in &inner.subscriptions {
            if sub.filter.matches(&arc) {
                (sub.sink)(&arc);
            }
        }
    }

    /// Retrieve all entries matching `filter` (or everything, if `None`),
    /// in insertion order. Takes the O(k) tab-only fast path when possible.
    pub fn get_all(&self, filter: Option<&F>) -> Vec<E> {
        let now = now_ms();
        let mut inner = self.inner.lock().unwrap();
        Self::evict_expired(&mut inner, self.ttl, now);

        if let Some(f) = filter {
            if let Some(tab_id) = f.only_tab() {
                return inner
                    .tab_index
                    .get(&tab_id)
                    .map(|list| list.iter().map(|e| (**e).clone()).collect())
                    .unwrap_or_default();
            }
        }

        inner
            .ring
            .iter()
            .filter(|e| filter.map(|f| f.matches(e)).unwrap_or(true))
            .map(|e| (**e).clone())
            .collect()
    }

    /// Drop entries. Without a filter, everything is dropped. With one,
    /// entries are retained when `tab_id != filter.tab_id` OR
    /// `timestamp >= parseTime(filter.before)`.
    pub fn clear(&self, filter: Option<&ClearFilter>) {
        let now = now_ms();
        let mut inner = self.inner.lock().unwrap();

        let Some(filter) = filter else {
            inner.ring.clear();
            inner.tab_index.clear();
            inner.latest_session.clear();
            return;
        };

        let before_ms = filter
            .before
            .as_deref()
            .and_then(|s| crate::time_util::parse_time(now, s));

        let retain = |e: &Arc<E>| -> bool {
            match (filter.tab_id, before_ms) {
                (Some(tab_id), Some(before)) => e.tab_id() != tab_id || e.timestamp() >= before,
                (Some(tab_id), None) => e.tab_id() != tab_id,
                (None, Some(before)) => e.timestamp() >= before,
                (None, None) => true,
            }
        };

        inner.ring.retain(|e| retain(e));

        let mut new_tab_index: HashMap<i64, VecDeque<Arc<E>>> = HashMap::new();
        for e in &inner.ring {
            new_tab_index
                .entry(e.tab_id())
                .or_default()
                .push_back(e.clone());
        }
        inner.latest_session.retain(|tab, _| new_tab_index.contains_key(tab));
        inner.tab_index = new_tab_index;
    }

    /// Register `sink` to be invoked (under the store lock, must not
    /// re-enter the store) on every insert matching `filter`.
    pub fn subscribe(&self, filter: F, sink: Sink<E>) -> SubscriptionHandle {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.push(Subscription { id, filter, sink });
        SubscriptionHandle(id)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.retain(|s| s.id != handle.0);
    }

    pub fn stats(&self) -> StoreStats {
        let now = now_ms();
        let mut inner = self.inner.lock().unwrap();
        Self::evict_expired(&mut inner, self.ttl, now);

        let per_tab = inner
            .tab_index
            .iter()
            .map(|(tab, list)| (*tab, list.len()))
            .collect();
        let tabs = inner.tab_index.keys().copied().collect();
        StoreStats {
            total: inner.ring.len(),
            per_tab,
            tabs,
        }
    }

    pub fn latest_session(&self, tab_id: i64) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.latest_session.get(&tab_id).cloned()
    }

    fn evict_expired(inner: &mut Inner<E, F>, ttl: Option<Duration>, now: i64) {
        let Some(ttl) = ttl else { return };
        let ttl_ms = ttl.as_millis() as i64;
        while let Some(front) = inner.ring.front() {
            if now - front.timestamp() > ttl_ms {
                Self::evict_front(inner);
            } else {
                break;
            }
        }
    }

    /// Evict the front of the ring, keeping the per-tab index and
    /// latest-session bookkeeping consistent. Eviction is by insertion
    /// order, never by timestamp order (spec §4.1).
    fn evict_front(inner: &mut Inner<E, F>) {
        let Some(oldest) = inner.ring.pop_front() else {
            return;
        };
        let tab_id = oldest.tab_id();

        if let Some(list) = inner.tab_index.get_mut(&tab_id) {
            // Fast path: the evicted entry is almost always the front of its
            // own tab's list too. Fall back to a linear search only on the
            // rare out-of-order eviction.
            match list.front() {
                Some(front) if front.id() == oldest.id() => {
                    list.pop_front();
                }
                _ => {
                    if let Some(pos) = list.iter().position(|e| e.id() == oldest.id()) {
                        list.remove(pos);
                    }
                }
            }
            if list.is_empty() {
                inner.tab_index.remove(&tab_id);
                inner.latest_session.remove(&tab_id);
            }
        }
    }
}
