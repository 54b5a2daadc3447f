//! Request Correlator (C6): turns broker→browser commands into awaitable
//! operations, matched to their responses by `requestId`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::CorrelatorError;
use crate::hub::frames::{CommandKind, ServerFrame};

type PendingResult = Result<Value, CorrelatorError>;

struct PendingEntry {
    responder: oneshot::Sender<PendingResult>,
}

/// A response frame's payload, prior to correlation: either a result value
/// or (for `execute_js`) a JS-level exception description.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Function the correlator calls to actually broadcast a command frame to
/// connected clients. Kept generic over the transport so this module has
/// no dependency on axum/websocket types.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, frame: ServerFrame);
}

#[derive(Debug, Serialize)]
pub struct Command {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub payload: Value,
}

pub struct Correlator {
    pending: Mutex<HashMap<String, PendingEntry>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a command of `kind` with `payload`, broadcast it, and await the
    /// matching response (or a timeout/hub-closure rejection).
    pub async fn call(
        &self,
        broadcaster: &dyn Broadcaster,
        kind: CommandKind,
        mut payload: Value,
        timeout: Duration,
    ) -> PendingResult {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        // Install the pending entry before broadcasting, so a response can
        // never race ahead of its own registration (spec §5 ordering
        // guarantee).
        {
            let mut pending = self.pending.lock().unwrap();
            pending.insert(request_id.clone(), PendingEntry { responder: tx });
        }

        if let Value::Object(ref mut map) = payload {
            map.insert("requestId".into(), Value::String(request_id.clone()));
        }
        broadcaster.broadcast(ServerFrame::command(kind, payload));

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // Sender was dropped without sending: hub shutdown swept it.
            Ok(Err(_)) => Err(CorrelatorError::HubClosing),
            Err(_elapsed) => {
                self.pending.lock().unwrap().remove(&request_id);
                Err(CorrelatorError::Timeout)
            }
        }
    }

    /// Resolve (or reject, for `execute_js` exceptions) a pending command by
    /// `requestId`. A response with no matching pending entry — duplicate or
    /// unknown — is logged and discarded.
    pub fn resolve(&self, payload: ResponsePayload) {
        let entry = self.pending.lock().unwrap().remove(&payload.request_id);
        let Some(entry) = entry else {
            tracing::warn!(request_id = %payload.request_id, "response with no matching pending command");
            return;
        };

        let result = match payload.error {
            Some(msg) => Err(CorrelatorError::JsException(msg)),
            None => Ok(payload.result.unwrap_or(Value::Null)),
        };
        // Ignore send errors: the awaiting `call` may have already timed out.
        let _ = entry.responder.send(result);
    }

    /// Reject every pending command with a uniform "hub closing" error, and
    /// clear the map. Called once on hub shutdown.
    pub fn close(&self) {
        let mut pending = self.pending.lock().unwrap();
        for (_, entry) in pending.drain() {
            let _ = entry.responder.send(Err(CorrelatorError::HubClosing));
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    struct RecordingBroadcaster {
        sent: Arc<StdMutex<Vec<ServerFrame>>>,
    }

    impl Broadcaster for RecordingBroadcaster {
        fn broadcast(&self, frame: ServerFrame) {
            self.sent.lock().unwrap().push(frame);
        }
    }

    fn request_id_of(frame: &ServerFrame) -> String {
        frame
            .request_id()
            .unwrap_or_else(|| panic!("unexpected frame: {frame:?}"))
            .to_string()
    }

    #[tokio::test]
    async fn resolve_completes_call() {
        let correlator = Correlator::new();
        let sent = Arc::new(StdMutex::new(vec![]));
        let broadcaster = RecordingBroadcaster { sent: sent.clone() };

        let call = correlator.call(
            &broadcaster,
            CommandKind::ExecuteJs,
            serde_json::json!({ "code": "1+1", "tabId": 7 }),
            Duration::from_secs(5),
        );

        // Simulate the browser's response arriving concurrently.
        let correlator_ref = &correlator;
        let responder = async {
            tokio::task::yield_now().await;
            let request_id = request_id_of(&sent.lock().unwrap()[0]);
            correlator_ref.resolve(ResponsePayload {
                request_id,
                result: Some(serde_json::json!(2)),
                error: None,
            });
        };

        let (result, _) = tokio::join!(call, responder);
        assert_eq!(result.unwrap(), serde_json::json!(2));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn timeout_removes_pending_entry() {
        let correlator = Correlator::new();
        let sent = Arc::new(StdMutex::new(vec![]));
        let broadcaster = RecordingBroadcaster { sent };

        let result = correlator
            .call(
                &broadcaster,
                CommandKind::ExecuteJs,
                serde_json::json!({}),
                Duration::from_millis(10),
            )
            .await;

        assert!(matches!(result, Err(CorrelatorError::Timeout)));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn unknown_request_id_is_dropped_silently() {
        let correlator = Correlator::new();
        correlator.resolve(ResponsePayload {
            request_id: "nonexistent".into(),
            result: None,
            error: None,
        });
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn close_rejects_all_pending() {
        let correlator = Arc::new(Correlator::new());
        let sent = Arc::new(StdMutex::new(vec![]));
        let broadcaster = RecordingBroadcaster { sent };

        let correlator2 = correlator.clone();
        let call = tokio::spawn(async move {
            correlator2
                .call(
                    &broadcaster,
                    CommandKind::ExecuteJs,
                    serde_json::json!({}),
                    Duration::from_secs(30),
                )
                .await
        });

        tokio::task::yield_now().await;
        correlator.close();

        let result = call.await.unwrap();
        assert!(matches!(result, Err(CorrelatorError::HubClosing)));
    }

    #[tokio::test]
    async fn execute_js_exception_surfaces_as_error() {
        let correlator = Correlator::new();
        let sent = Arc::new(StdMutex::new(vec![]));
        let broadcaster = RecordingBroadcaster { sent: sent.clone() };

        let call = correlator.call(
            &broadcaster,
            CommandKind::ExecuteJs,
            serde_json::json!({}),
            Duration::from_secs(5),
        );
        let correlator_ref = &correlator;
        let responder = async {
            tokio::task::yield_now().await;
            let request_id = request_id_of(&sent.lock().unwrap()[0]);
            correlator_ref.resolve(ResponsePayload {
                request_id,
                result: None,
                error: Some("ReferenceError: x is not defined".into()),
            });
        };

        let (result, _) = tokio::join!(call, responder);
        assert!(matches!(result, Err(CorrelatorError::JsException(_))));
    }
}
