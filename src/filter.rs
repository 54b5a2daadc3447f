//! Filter engine (C2): compiles a filter descriptor once into a reusable,
//! pure matcher used by the stores (C1) and by search (C3).

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::model::{InitiatorType, LogEntry, LogLevel, NetEntry};
use crate::time_util::parse_time;

/// Something a store can use to test whether an entry should be included,
/// and that can report when it reduces to "entries for exactly one tab" so
/// the store can take its O(k) fast path.
pub trait StoreFilter<E> {
    fn matches(&self, entry: &E) -> bool;

    /// `Some(tab_id)` when this filter constrains nothing but `tab_id`.
    fn only_tab(&self) -> Option<i64> {
        None
    }
}

/// Wire descriptor for a log filter, as received from a tool-server request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilterDescriptor {
    #[serde(default)]
    pub levels: Option<Vec<LogLevel>>,
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<i64>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(rename = "urlPattern", default)]
    pub url_pattern: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

/// Compiled, immutable form of a [`LogFilterDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct CompiledLogFilter {
    levels: Option<HashSet<LogLevel>>,
    tab_id: Option<i64>,
    session_id: Option<String>,
    url_regex: Option<Regex>,
    after_ms: Option<i64>,
    before_ms: Option<i64>,
}

impl CompiledLogFilter {
    pub fn compile(desc: &LogFilterDescriptor, now_ms: i64) -> Self {
        Self {
            levels: desc
                .levels
                .as_ref()
                .map(|ls| ls.iter().copied().collect()),
            tab_id: desc.tab_id,
            session_id: desc.session_id.clone(),
            // Invalid regex is treated as "no URL constraint" (spec §4.1 failure semantics).
            url_regex: desc
                .url_pattern
                .as_deref()
                .and_then(|p| Regex::new(p).ok()),
            after_ms: desc.after.as_deref().and_then(|s| parse_time(now_ms, s)),
            before_ms: desc.before.as_deref().and_then(|s| parse_time(now_ms, s)),
        }
    }
}

impl StoreFilter<LogEntry> for CompiledLogFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(levels) = &self.levels {
            if !levels.contains(&entry.level) {
                return false;
            }
        }
        if let Some(tab_id) = self.tab_id {
            if entry.tab_id != tab_id {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if &entry.session_id != session_id {
                return false;
            }
        }
        if let Some(re) = &self.url_regex {
            if !re.is_match(&entry.url) {
                return false;
            }
        }
        if let Some(after) = self.after_ms {
            if entry.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.before_ms {
            if entry.timestamp > before {
                return false;
            }
        }
        true
    }

    fn only_tab(&self) -> Option<i64> {
        if self.levels.is_none()
            && self.session_id.is_none()
            && self.url_regex.is_none()
            && self.after_ms.is_none()
            && self.before_ms.is_none()
        {
            self.tab_id
        } else {
            None
        }
    }
}

/// Wire descriptor for a network filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetFilterDescriptor {
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<i64>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(rename = "urlPattern", default)]
    pub url_pattern: Option<String>,
    #[serde(rename = "initiatorTypes", default)]
    pub initiator_types: Option<Vec<InitiatorType>>,
    #[serde(rename = "minDuration", default)]
    pub min_duration: Option<f64>,
    #[serde(rename = "maxDuration", default)]
    pub max_duration: Option<f64>,
    #[serde(rename = "isError", default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledNetFilter {
    tab_id: Option<i64>,
    session_id: Option<String>,
    url_regex: Option<Regex>,
    initiator_types: Option<HashSet<InitiatorType>>,
    min_duration: Option<f64>,
    max_duration: Option<f64>,
    is_error: Option<bool>,
    after_ms: Option<i64>,
    before_ms: Option<i64>,
}

impl CompiledNetFilter {
    pub fn compile(desc: &NetFilterDescriptor, now_ms: i64) -> Self {
        Self {
            tab_id: desc.tab_id,
            session_id: desc.session_id.clone(),
            // Network URL matching is case-insensitive (spec §4.2/§9 Open Question 2).
            url_regex: desc.url_pattern.as_deref().and_then(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .ok()
            }),
            initiator_types: desc
                .initiator_types
                .as_ref()
                .map(|ts| ts.iter().cloned().collect()),
            min_duration: desc.min_duration,
            max_duration: desc.max_duration,
            is_error: desc.is_error,
            after_ms: desc.after.as_deref().and_then(|s| parse_time(now_ms, s)),
            before_ms: desc.before.as_deref().and_then(|s| parse_time(now_ms, s)),
        }
    }
}

impl StoreFilter<NetEntry> for CompiledNetFilter {
    fn matches(&self, entry: &NetEntry) -> bool {
        if let Some(tab_id) = self.tab_id {
            if entry.tab_id != tab_id {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if &entry.session_id != session_id {
                return false;
            }
        }
        if let Some(re) = &self.url_regex {
            // Checks both `url` and `pageUrl`, matching either (spec §4.2).
            if !re.is_match(&entry.url) && !re.is_match(&entry.page_url) {
                return false;
            }
        }
        if let Some(types) = &self.initiator_types {
            if !types.contains(&entry.initiator_type) {
                return false;
            }
        }
        if let Some(min) = self.min_duration {
            if entry.duration < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if entry.duration > max {
                return false;
            }
        }
        if let Some(is_error) = self.is_error {
            if entry.is_error != is_error {
                return false;
            }
        }
        if let Some(after) = self.after_ms {
            if entry.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.before_ms {
            if entry.timestamp > before {
                return false;
            }
        }
        true
    }

    fn only_tab(&self) -> Option<i64> {
        if self.session_id.is_none()
            && self.url_regex.is_none()
            && self.initiator_types.is_none()
            && self.min_duration.is_none()
            && self.max_duration.is_none()
            && self.is_error.is_none()
            && self.after_ms.is_none()
            && self.before_ms.is_none()
        {
            self.tab_id
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_ms;

    fn sample_log(tab_id: i64, url: &str, ts: i64) -> LogEntry {
        LogEntry {
            id: "L1".into(),
            timestamp: ts,
            level: LogLevel::Error,
            message: "boom".into(),
            args: vec![],
            stack: None,
            tab_id,
            url: url.into(),
            session_id: "S".into(),
        }
    }

    #[test]
    fn invalid_regex_is_ignored() {
        let desc = LogFilterDescriptor {
            url_pattern: Some("(unterminated".into()),
            ..Default::default()
        };
        let compiled = CompiledLogFilter::compile(&desc, now_ms());
        assert!(compiled.matches(&sample_log(1, "http://x/", 0)));
    }

    #[test]
    fn tab_only_fast_path_detection() {
        let desc = LogFilterDescriptor {
            tab_id: Some(7),
            ..Default::default()
        };
        let compiled = CompiledLogFilter::compile(&desc, now_ms());
        assert_eq!(compiled.only_tab(), Some(7));

        let desc_with_level = LogFilterDescriptor {
            tab_id: Some(7),
            levels: Some(vec![LogLevel::Error]),
            ..Default::default()
        };
        let compiled2 = CompiledLogFilter::compile(&desc_with_level, now_ms());
        assert_eq!(compiled2.only_tab(), None);
    }

    #[test]
    fn level_and_time_bounds() {
        let now = 1_700_000_000_000;
        let desc = LogFilterDescriptor {
            levels: Some(vec![LogLevel::Error]),
            after: Some("5s".into()),
            ..Default::default()
        };
        let compiled = CompiledLogFilter::compile(&desc, now);
        assert!(compiled.matches(&sample_log(1, "http://x/", now)));
        assert!(!compiled.matches(&sample_log(1, "http://x/", now - 10_000)));
    }
}
