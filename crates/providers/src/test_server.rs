//! In-process HTTP server for exercising the provider clients.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A canned reply.
#[derive(Clone)]
pub struct Reply {
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
}

impl Reply {
    /// Hold the reply back for `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub fn respond_with(status: StatusCode, body: Value) -> Reply {
    Reply {
        status,
        body: body.to_string(),
        delay: None,
    }
}

pub fn respond_raw(status: StatusCode, body: &str) -> Reply {
    Reply {
        status,
        body: body.to_string(),
        delay: None,
    }
}

struct Recorded {
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone)]
struct Shared {
    reply: Reply,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

pub struct TestServer {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Serve `reply` for every POST to `path` on an ephemeral port.
    pub async fn start(path: &str, reply: Reply) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = Shared {
            reply,
            seen: seen.clone(),
        };
        let app = Router::new().route(path, post(handle)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, seen, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.seen.lock().unwrap().last().map(|r| r.body.clone())
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.seen.lock().unwrap().last().map(|r| r.headers.clone())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.seen.lock().unwrap().push(Recorded { headers, body });

    if let Some(delay) = state.reply.delay {
        tokio::time::sleep(delay).await;
    }

    (
        state.reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.reply.body.clone(),
    )
}
