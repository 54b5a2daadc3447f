//! End-to-end scenarios from spec §8, exercised against the real HTTP router
//! (via `tower::ServiceExt::oneshot`) and a real WebSocket listener (via
//! `tokio_tungstenite`) rather than any mocked transport.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use console_bridge_broker::config::Config;
use console_bridge_broker::correlator::Correlator;
use console_bridge_broker::hub::{ws_handler, ClientHub};
use console_bridge_broker::http::{create_router, AppState};
use console_bridge_broker::model::{now_ms, LogEntry, LogLevel};
use console_bridge_broker::registry::TabRegistry;
use console_bridge_broker::search::{self, KeywordSearchParams, RegexSearchParams};
use console_bridge_broker::store::log::LogStore;
use console_bridge_broker::store::net::NetStore;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;
use uuid::Uuid;

fn log(id: &str, tab_id: i64, ts: i64) -> LogEntry {
    LogEntry {
        id: id.into(),
        timestamp: ts,
        level: LogLevel::Error,
        message: "boom".into(),
        args: vec![],
        stack: None,
        tab_id,
        url: "http://x/".into(),
        session_id: "S".into(),
    }
}

fn test_state(max_logs: usize, max_network: usize, ttl: Option<Duration>) -> AppState {
    let log_store = Arc::new(LogStore::new(max_logs, ttl));
    let net_store = Arc::new(NetStore::new(max_network, ttl));
    let registry = Arc::new(TabRegistry::new());
    let correlator = Arc::new(Correlator::new());
    let hub = Arc::new(ClientHub::new(
        log_store.clone(),
        net_store.clone(),
        registry.clone(),
        correlator.clone(),
    ));
    AppState {
        log_store,
        net_store,
        registry,
        correlator,
        hub,
        config: Arc::new(Config::default()),
        server_id: Uuid::new_v4().to_string(),
    }
}

async fn post_json(
    router: axum::Router,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get(router: axum::Router, path: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().method("GET").uri(path).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// Scenario 1: basic ingress.
#[tokio::test]
async fn basic_ingress_reaches_stats_and_logs() {
    let state = test_state(1000, 1000, None);
    state.log_store.add(log("L1", 7, 1000));

    let router = create_router(state);
    let (status, stats) = get(router.clone(), "/maintenance/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["logs"]["total"], 1);

    let (status, body) = post_json(router, "/api/logs", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"][0]["id"], "L1");
}

// Scenario 2: ring eviction.
#[tokio::test]
async fn ring_eviction_keeps_last_three() {
    let state = test_state(3, 1000, None);
    for i in 1..=5 {
        state.log_store.add(log(&format!("L{i}"), 7, i));
    }
    let router = create_router(state);
    let (_, body) = post_json(router, "/api/logs", json!({})).await;
    let ids: Vec<&str> = body["logs"].as_array().unwrap().iter().map(|l| l["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["L3", "L4", "L5"]);
    assert_eq!(body["count"], 3);
}

// Scenario 3: TTL eviction.
#[tokio::test]
async fn ttl_eviction_hides_expired_entries() {
    let state = test_state(1000, 1000, Some(Duration::from_secs(60)));
    let stale_ts = now_ms() - 120_000;
    state.log_store.add(log("L1", 1, stale_ts));
    let router = create_router(state);
    let (_, stats) = get(router.clone(), "/maintenance/stats").await;
    assert_eq!(stats["logs"]["total"], 0);
}

// Scenario 4: command correlation over a real WebSocket.
#[tokio::test]
async fn command_correlation_round_trips_over_real_socket() {
    let state = test_state(1000, 1000, None);
    let hub_for_ws = state.hub.clone();

    let ws_router = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(hub_for_ws);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, ws_router).await.unwrap();
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await.unwrap();

    let router = create_router(state);
    let call = post_json(router, "/api/execute", json!({ "code": "1+1", "tabId": 7 }));

    let respond = async {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = match msg {
            Message::Text(t) => t.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["type"], "execute_js");
        let request_id = frame["data"]["requestId"].as_str().unwrap().to_string();

        let response = json!({
            "type": "execute_js_response",
            "data": { "requestId": request_id, "result": 2 }
        });
        ws.send(Message::Text(response.to_string().into())).await.unwrap();
    };

    let ((status, body), ()) = tokio::join!(call, respond);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 2);
}

// Scenario 5 (partial): two concurrent /discover reads against one broker
// agree on `serverId` — the part of singleton election observable without
// spawning a second OS process (covered at the unit level in `spawner.rs`).
#[tokio::test]
async fn discover_is_stable_across_concurrent_reads() {
    let state = test_state(1000, 1000, None);
    let router = create_router(state);

    let (a, b) = tokio::join!(
        get(router.clone(), "/discover"),
        get(router.clone(), "/discover"),
    );
    assert_eq!(a.1["serverId"], b.1["serverId"]);
    assert_eq!(a.1["identifier"], "console-bridge");
}

// Scenario 6: search with context.
#[tokio::test]
async fn search_with_context_never_crosses_slice() {
    let state = test_state(1000, 1000, None);
    for i in 0..10 {
        state.log_store.add(LogEntry {
            id: format!("L{i}"),
            timestamp: i,
            level: LogLevel::Error,
            message: format!("msg {i} err"),
            args: vec![],
            stack: None,
            tab_id: 1,
            url: "http://x/".into(),
            session_id: "S".into(),
        });
    }
    let logs = state.log_store.get_all(None);
    let result = search::regex_search(
        &logs,
        &RegexSearchParams {
            pattern: "err".into(),
            case_sensitive: false,
            fields: vec![search::SearchField::Message],
            context_lines: 1,
            limit: 100,
        },
    );
    assert_eq!(result.total, 10);
    assert!(result.matches[0].context_before.is_empty());
    assert_eq!(result.matches[0].context_after.len(), 1);

    let keyword_result = search::keyword_search(
        &logs,
        &KeywordSearchParams {
            keywords: vec!["err".into()],
            logic: Default::default(),
            exclude: vec![],
            limit: 100,
        },
    );
    assert_eq!(keyword_result.total, 10);
}
