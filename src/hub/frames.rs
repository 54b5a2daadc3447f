//! Wire frame schema for the Client Hub (C5).
//!
//! Every frame is a JSON object `{"type": ..., "data": ...}` — a classic
//! adjacently-tagged union, which `serde`'s `tag`/`content` attributes model
//! directly. Inbound and outbound grammars are distinct enums; a frame that
//! matches neither is logged and dropped (spec §4.4).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::correlator::ResponsePayload;
use crate::model::{LogEntry, NetEntry};

#[derive(Debug, Clone, Deserialize)]
pub struct TabFramePayload {
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "lastNavigationAt", default)]
    pub last_navigation_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabClosedPayload {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatPayload {}

#[derive(Debug, Clone, Deserialize)]
pub struct InjectMarkerPayload {
    #[serde(rename = "tabId")]
    pub tab_id: i64,
    pub url: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Inbound (client → broker) frame grammar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    Log(LogEntry),
    NetworkEntry(NetEntry),
    TabOpened(TabFramePayload),
    TabUpdated(TabFramePayload),
    TabClosed(TabClosedPayload),
    Heartbeat(HeartbeatPayload),
    InjectMarker(InjectMarkerPayload),
    ExecuteJsResponse(ResponsePayload),
    PageInfoResponse(ResponsePayload),
    QueryDomResponse(ResponsePayload),
    DomSnapshotResponse(ResponsePayload),
}

/// The kind of a broker→browser command, shared between the correlator and
/// the HTTP surface that initiates calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ExecuteJs,
    GetPageInfo,
    QueryDom,
    DomSnapshot,
}

/// Outbound (broker → client) frame grammar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    Configure(Value),
    Ping(Value),
    ExecuteJs(Value),
    GetPageInfo(Value),
    QueryDom(Value),
    GetDomSnapshot(Value),
}

impl ServerFrame {
    pub fn command(kind: CommandKind, payload: Value) -> Self {
        match kind {
            CommandKind::ExecuteJs => ServerFrame::ExecuteJs(payload),
            CommandKind::GetPageInfo => ServerFrame::GetPageInfo(payload),
            CommandKind::QueryDom => ServerFrame::QueryDom(payload),
            CommandKind::DomSnapshot => ServerFrame::GetDomSnapshot(payload),
        }
    }

    pub fn ping() -> Self {
        ServerFrame::Ping(serde_json::json!({}))
    }

    /// Extract the `requestId` carried in a command frame's payload, if any.
    pub fn request_id(&self) -> Option<&str> {
        let data = match self {
            ServerFrame::ExecuteJs(v)
            | ServerFrame::GetPageInfo(v)
            | ServerFrame::QueryDom(v)
            | ServerFrame::GetDomSnapshot(v) => v,
            _ => return None,
        };
        data.get("requestId").and_then(Value::as_str)
    }
}
