//! Request/response DTOs for the HTTP Surface (C7).

use serde::{Deserialize, Serialize};

use crate::filter::{LogFilterDescriptor, NetFilterDescriptor};
use crate::model::{LogEntry, NetEntry, TabInfo};
use crate::search::SearchField;
use crate::store::StoreStats;

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverResponse {
    pub identifier: String,
    #[serde(rename = "serverId")]
    pub server_id: String,
    #[serde(rename = "wsHost")]
    pub ws_host: String,
    #[serde(rename = "wsPort")]
    pub ws_port: u16,
    #[serde(rename = "wsUrl")]
    pub ws_url: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub logs: StoreStats,
    pub network: StoreStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearRequest {
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<i64>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Txt,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRequest {
    pub format: Option<ExportFormat>,
    #[serde(default)]
    pub filter: Option<LogFilterDescriptor>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(rename = "prettyPrint", default)]
    pub pretty_print: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsRequest {
    #[serde(default)]
    pub filter: Option<LogFilterDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAction {
    #[default]
    List,
    Slow,
    Errors,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkRequest {
    #[serde(default)]
    pub action: NetworkAction,
    #[serde(default)]
    pub filter: Option<NetFilterDescriptor>,
    #[serde(rename = "minDuration", default)]
    pub min_duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkResponse {
    pub entries: Vec<NetEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabsResponse {
    pub tabs: Vec<TabInfo>,
    #[serde(rename = "connectionCount")]
    pub connection_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryDomRequest {
    pub selector: String,
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotRequest {
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAction {
    Regex,
    Keyword,
}

/// Flattened request body for `/api/search` — only the fields relevant to
/// `action` are read.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub action: SearchAction,
    #[serde(default)]
    pub filter: Option<LogFilterDescriptor>,

    // regex
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(rename = "caseSensitive", default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub fields: Option<Vec<SearchField>>,
    #[serde(rename = "contextLines", default)]
    pub context_lines: usize,

    // keyword
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub logic: Option<crate::search::KeywordLogic>,
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    100
}
