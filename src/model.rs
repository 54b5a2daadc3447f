//! Core data model: LogEntry, NetEntry, TabInfo and the types they share.

use serde::{Deserialize, Serialize};

/// Console levels a browser can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// A single console log / uncaught-error record, immutable after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: i64,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(rename = "tabId")]
    pub tab_id: i64,
    pub url: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Closed set of resource-initiator kinds, with an escape hatch for anything
/// the browser reports that this enum doesn't know about yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorType {
    Fetch,
    Xmlhttprequest,
    Script,
    Link,
    Img,
    Css,
    Font,
    Navigation,
    #[serde(other)]
    Other,
}

/// A single resource-timing record, immutable after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetEntry {
    pub id: String,
    pub timestamp: i64,
    #[serde(rename = "tabId")]
    pub tab_id: i64,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "pageUrl")]
    pub page_url: String,
    pub url: String,

    #[serde(rename = "initiatorType")]
    pub initiator_type: InitiatorType,
    pub status: u16,
    pub size: i64,
    #[serde(rename = "decodedSize")]
    pub decoded_size: i64,
    #[serde(rename = "headerSize")]
    pub header_size: i64,
    pub protocol: String,
    pub cached: bool,
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(rename = "isBlocking")]
    pub is_blocking: bool,

    pub duration: f64,
    #[serde(rename = "dnsTime", default)]
    pub dns_time: Option<f64>,
    #[serde(rename = "connectionTime", default)]
    pub connection_time: Option<f64>,
    #[serde(rename = "tlsTime", default)]
    pub tls_time: Option<f64>,
    #[serde(default)]
    pub ttfb: Option<f64>,
    #[serde(rename = "downloadTime", default)]
    pub download_time: Option<f64>,
    #[serde(rename = "stallTime", default)]
    pub stall_time: Option<f64>,
}

/// Anything the bounded store can index by tab, time and session.
pub trait StoreEntry: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn timestamp(&self) -> i64;
    fn tab_id(&self) -> i64;
    fn session_id(&self) -> &str;
}

impl StoreEntry for LogEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn tab_id(&self) -> i64 {
        self.tab_id
    }
    fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl StoreEntry for NetEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn tab_id(&self) -> i64 {
        self.tab_id
    }
    fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Mutable record of a browser tab, maintained from client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "lastNavigationAt")]
    pub last_navigation_at: i64,
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
