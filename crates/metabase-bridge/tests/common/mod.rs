//! Mock Metabase server shared by the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use metabase_bridge::BridgeConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SESSION_COOKIE: &str = "metabase.SESSION=0f6c6f0e-test";

type Responder = dyn Fn(&[u8]) -> (StatusCode, &'static str, String) + Send + Sync;

/// A request the mock received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    responder: Box<Responder>,
    delay: Duration,
}

/// Metabase stand-in listening on an ephemeral loopback port
pub struct MockMetabase {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockMetabase {
    /// Answer every request with the output of `responder`
    pub async fn start<F>(delay: Duration, responder: F) -> Self
    where
        F: Fn(&[u8]) -> (StatusCode, &'static str, String) + Send + Sync + 'static,
    {
        let state = Arc::new(MockState {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay,
        });

        let app = Router::new()
            .fallback(record_and_respond)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Answer every request with a fixed JSON body
    pub async fn json(status: StatusCode, body: Value) -> Self {
        let body = body.to_string();
        Self::start(Duration::ZERO, move |_| {
            (status, "application/json", body.clone())
        })
        .await
    }

    /// Answer every request with a fixed non-JSON body
    pub async fn text(status: StatusCode, content_type: &'static str, body: &'static str) -> Self {
        Self::start(Duration::ZERO, move |_| (status, content_type, body.to_string())).await
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bridge configuration pointing at this mock
    pub fn config(&self, database_id: i64) -> BridgeConfig {
        BridgeConfig::builder()
            .database_id(database_id)
            .base_url(self.base_url())
            .credential(SESSION_COOKIE)
            .build()
            .unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockMetabase {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record_and_respond(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (status, content_type, reply) = (state.responder)(&body);
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    (status, [(header::CONTENT_TYPE, content_type)], reply).into_response()
}

/// A completed dataset response in the shape Metabase returns
pub fn dataset_response(database_id: i64, rows: Value) -> Value {
    let row_count = rows.as_array().map_or(0, |r| r.len());
    json!({
        "data": {
            "rows": rows,
            "cols": [{
                "display_name": "count",
                "source": "native",
                "field_ref": ["field", "count", {"base-type": "type/BigInteger"}],
                "name": "count",
                "base_type": "type/BigInteger",
                "effective_type": "type/BigInteger"
            }],
            "native_form": {"query": "SELECT COUNT(*) FROM users", "params": null},
            "results_timezone": "UTC",
            "results_metadata": {"columns": []},
            "insights": null
        },
        "cached": false,
        "database_id": database_id,
        "started_at": "2024-05-01T10:00:00.000Z",
        "average_execution_time": null,
        "status": "completed",
        "context": "ad-hoc",
        "row_count": row_count,
        "running_time": 23
    })
}
