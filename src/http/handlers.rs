//! HTTP Surface (C7): discovery, maintenance, and query endpoints consumed
//! by tool-server processes.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{routing::get, routing::post, Json, Router};

use crate::config::{Config, DISCOVERY_IDENTIFIER};
use crate::correlator::Correlator;
use crate::error::AppError;
use crate::filter::{CompiledLogFilter, CompiledNetFilter};
use crate::hub::frames::CommandKind;
use crate::hub::ClientHub;
use crate::model::now_ms;
use crate::registry::TabRegistry;
use crate::search::{self, KeywordSearchParams, RegexSearchParams};
use crate::store::ClearFilter;
use crate::store::log::LogStore;
use crate::store::net::NetStore;

use super::export;
use super::types::*;

#[derive(Clone)]
pub struct AppState {
    pub log_store: Arc<LogStore>,
    pub net_store: Arc<NetStore>,
    pub registry: Arc<TabRegistry>,
    pub correlator: Arc<Correlator>,
    pub hub: Arc<ClientHub>,
    pub config: Arc<Config>,
    pub server_id: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/discover", get(discover))
        .route("/maintenance/stats", get(maintenance_stats))
        .route("/maintenance/clear", post(maintenance_clear))
        .route("/maintenance/export", post(maintenance_export))
        .route("/api/logs", post(api_logs))
        .route("/api/network", post(api_network))
        .route("/api/tabs", get(api_tabs))
        .route("/api/execute", post(api_execute))
        .route("/api/query-dom", post(api_query_dom))
        .route("/api/snapshot", post(api_snapshot))
        .route("/api/search", post(api_search))
        .with_state(state)
}

async fn discover(State(state): State<AppState>) -> Json<DiscoverResponse> {
    Json(DiscoverResponse {
        identifier: DISCOVERY_IDENTIFIER.to_string(),
        server_id: state.server_id.clone(),
        ws_host: "127.0.0.1".to_string(),
        ws_port: state.config.ws_port,
        ws_url: state.config.ws_url(),
        timestamp: now_ms(),
    })
}

async fn maintenance_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        logs: state.log_store.stats(),
        network: state.net_store.stats(),
    })
}

async fn maintenance_clear(
    State(state): State<AppState>,
    body: Option<Json<ClearRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    if req.tab_id.is_none() && req.before.is_none() {
        state.log_store.clear(None);
        state.net_store.clear(None);
    } else {
        let filter = ClearFilter {
            tab_id: req.tab_id,
            before: req.before,
        };
        state.log_store.clear(Some(&filter));
        state.net_store.clear(Some(&filter));
    }
    Json(serde_json::json!({ "cleared": true }))
}

async fn maintenance_export(
    State(state): State<AppState>,
    body: Option<Json<ExportRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let format = req.format.unwrap_or(ExportFormat::Json);

    let compiled = req
        .filter
        .as_ref()
        .map(|d| CompiledLogFilter::compile(d, now_ms()));
    let logs = state.log_store.get_all(compiled.as_ref());

    let body = export::encode(format, &logs, req.fields.as_deref(), req.pretty_print);
    Ok(([(axum::http::header::CONTENT_TYPE, export::content_type(format))], body))
}

async fn api_logs(
    State(state): State<AppState>,
    body: Option<Json<LogsRequest>>,
) -> Json<LogsResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let compiled = req
        .filter
        .as_ref()
        .map(|d| CompiledLogFilter::compile(d, now_ms()));
    let logs = state.log_store.get_all(compiled.as_ref());
    Json(LogsResponse {
        count: logs.len(),
        logs,
    })
}

async fn api_network(
    State(state): State<AppState>,
    body: Option<Json<NetworkRequest>>,
) -> Json<NetworkResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let mut desc = req.filter.clone().unwrap_or_default();
    match req.action {
        NetworkAction::List => {}
        NetworkAction::Slow => {
            desc.min_duration = req.min_duration.or(desc.min_duration);
        }
        NetworkAction::Errors => {
            desc.is_error = Some(true);
        }
    }
    let compiled = CompiledNetFilter::compile(&desc, now_ms());
    let entries = state.net_store.get_all(Some(&compiled));
    Json(NetworkResponse {
        count: entries.len(),
        entries,
    })
}

async fn api_tabs(State(state): State<AppState>) -> Json<TabsResponse> {
    Json(TabsResponse {
        tabs: state.registry.list(),
        connection_count: state.hub.connected_clients(),
    })
}

async fn api_execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::BadRequest("code must not be empty".to_string()));
    }
    let payload = serde_json::json!({ "code": req.code, "tabId": req.tab_id });
    let result = state
        .correlator
        .call(
            state.hub.as_ref(),
            CommandKind::ExecuteJs,
            payload,
            state.config.execute_timeout,
        )
        .await?;
    Ok(Json(CommandResponse { result }))
}

async fn api_query_dom(
    State(state): State<AppState>,
    Json(req): Json<QueryDomRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    if req.selector.trim().is_empty() {
        return Err(AppError::BadRequest("selector must not be empty".to_string()));
    }
    let payload = serde_json::json!({ "selector": req.selector, "tabId": req.tab_id });
    let result = state
        .correlator
        .call(
            state.hub.as_ref(),
            CommandKind::QueryDom,
            payload,
            state.config.execute_timeout,
        )
        .await?;
    Ok(Json(CommandResponse { result }))
}

async fn api_snapshot(
    State(state): State<AppState>,
    body: Option<Json<SnapshotRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let payload = serde_json::json!({ "tabId": req.tab_id });
    let result = state
        .correlator
        .call(
            state.hub.as_ref(),
            CommandKind::DomSnapshot,
            payload,
            state.config.snapshot_timeout,
        )
        .await?;
    Ok(Json(CommandResponse { result }))
}

async fn api_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let compiled = req
        .filter
        .as_ref()
        .map(|d| CompiledLogFilter::compile(d, now_ms()));
    let logs = state.log_store.get_all(compiled.as_ref());

    let result = match req.action {
        SearchAction::Regex => {
            let pattern = req
                .pattern
                .ok_or_else(|| AppError::BadRequest("pattern is required".to_string()))?;
            search::regex_search(
                &logs,
                &RegexSearchParams {
                    pattern,
                    case_sensitive: req.case_sensitive,
                    fields: req.fields.unwrap_or_else(|| {
                        vec![
                            search::SearchField::Message,
                            search::SearchField::Args,
                            search::SearchField::Stack,
                        ]
                    }),
                    context_lines: req.context_lines,
                    limit: req.limit,
                },
            )
        }
        SearchAction::Keyword => {
            let keywords = req
                .keywords
                .ok_or_else(|| AppError::BadRequest("keywords is required".to_string()))?;
            search::keyword_search(
                &logs,
                &KeywordSearchParams {
                    keywords,
                    logic: req.logic.unwrap_or_default(),
                    exclude: req.exclude,
                    limit: req.limit,
                },
            )
        }
    };

    Ok(Json(result))
}
