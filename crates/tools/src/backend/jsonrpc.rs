//! JSON-RPC backend for an ERP exposing `/jsonrpc` (`common.authenticate`,
//! `object.execute_kw`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{BackendError, Condition, DataBackend, Record};

/// Connection details for [`JsonRpcBackend`].
#[derive(Clone)]
pub struct JsonRpcCredentials {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for JsonRpcCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcCredentials")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Talks to a remote ERP. Authenticates lazily, once per backend instance.
pub struct JsonRpcBackend {
    endpoint: String,
    credentials: JsonRpcCredentials,
    uid: OnceCell<i64>,
    next_id: AtomicU64,
    client: reqwest::Client,
}

impl JsonRpcBackend {
    pub fn new(credentials: JsonRpcCredentials, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/jsonrpc", credentials.url.trim_end_matches('/')),
            credentials,
            uid: OnceCell::new(),
            next_id: AtomicU64::new(1),
            client,
        })
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {"service": service, "method": method, "args": args},
            "id": id,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let reply: RpcReply = response
            .json()
            .await
            .map_err(|e| BackendError::Remote(format!("invalid JSON-RPC reply: {e}")))?;

        match (reply.result, reply.error) {
            (_, Some(err)) => Err(BackendError::Remote(err.describe())),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    async fn uid(&self) -> Result<i64, BackendError> {
        self.uid
            .get_or_try_init(|| async {
                let c = &self.credentials;
                let result = self
                    .call(
                        "common",
                        "authenticate",
                        json!([c.database, c.username, c.password, {}]),
                    )
                    .await?;
                // A failed login returns `false` rather than an error.
                let uid = result.as_i64().ok_or_else(|| {
                    BackendError::Authentication(format!(
                        "login rejected for '{}' on database '{}'",
                        c.username, c.database
                    ))
                })?;
                debug!(uid, database = %c.database, "Authenticated with ERP backend");
                Ok::<i64, BackendError>(uid)
            })
            .await
            .copied()
    }

    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, BackendError> {
        let uid = self.uid().await?;
        let c = &self.credentials;
        self.call(
            "object",
            "execute_kw",
            json!([c.database, uid, c.password, model, method, args, kwargs]),
        )
        .await
    }
}

#[async_trait]
impl DataBackend for JsonRpcBackend {
    async fn search(
        &self,
        model: &str,
        domain: &[Condition],
        limit: Option<usize>,
    ) -> Result<Vec<i64>, BackendError> {
        let domain: Vec<Value> = domain.iter().map(Condition::to_domain_term).collect();
        let mut kwargs = json!({});
        if let Some(limit) = limit {
            kwargs["limit"] = json!(limit);
        }
        let result = self.execute_kw(model, "search", json!([domain]), kwargs).await?;
        serde_json::from_value(result)
            .map_err(|e| BackendError::Remote(format!("unexpected search result: {e}")))
    }

    async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>, BackendError> {
        let kwargs = if fields.is_empty() {
            json!({})
        } else {
            json!({"fields": fields})
        };
        let result = self.execute_kw(model, "read", json!([ids]), kwargs).await?;
        serde_json::from_value(result)
            .map_err(|e| BackendError::Remote(format!("unexpected read result: {e}")))
    }

    async fn write(&self, model: &str, id: i64, values: Record) -> Result<(), BackendError> {
        self.execute_kw(model, "write", json!([[id], values]), json!({}))
            .await
            .map(|_| ())
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError> {
        let result = self.execute_kw(model, "create", json!([values]), json!({})).await?;
        // Newer servers answer batch-style with a list of ids.
        result
            .as_i64()
            .or_else(|| result.get(0).and_then(Value::as_i64))
            .ok_or_else(|| BackendError::Remote(format!("unexpected create result: {result}")))
    }
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    message: String,
}

impl RpcError {
    fn describe(&self) -> String {
        match &self.data {
            Some(data) if !data.message.is_empty() => data.message.clone(),
            _ => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeErp {
        calls: Arc<Mutex<Vec<Value>>>,
        reject_login: bool,
    }

    async fn handle(State(erp): State<FakeErp>, Json(body): Json<Value>) -> Json<Value> {
        erp.calls.lock().unwrap().push(body.clone());
        let params = &body["params"];
        let result = match (params["service"].as_str(), params["method"].as_str()) {
            (Some("common"), Some("authenticate")) if erp.reject_login => json!(false),
            (Some("common"), Some("authenticate")) => json!(7),
            (Some("object"), Some("execute_kw")) => {
                let args = &params["args"];
                match args[4].as_str() {
                    Some("search") => json!([3]),
                    Some("read") => json!([{"id": 3, "name": "Standing Desk", "list_price": 499.0}]),
                    Some("write") => json!(true),
                    Some("create") => json!(11),
                    Some("unlink") => {
                        return Json(json!({
                            "jsonrpc": "2.0",
                            "id": body["id"],
                            "error": {"message": "Odoo Server Error", "data": {"message": "Access denied"}}
                        }));
                    }
                    _ => Value::Null,
                }
            }
            _ => Value::Null,
        };
        Json(json!({"jsonrpc": "2.0", "id": body["id"], "result": result}))
    }

    async fn start(erp: FakeErp) -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new().route("/jsonrpc", post(handle)).with_state(erp);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), task)
    }

    fn backend(url: &str) -> JsonRpcBackend {
        JsonRpcBackend::new(
            JsonRpcCredentials {
                url: url.into(),
                database: "prod".into(),
                username: "bot".into(),
                password: "secret".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn search_read_authenticates_once() {
        let erp = FakeErp::default();
        let (url, _task) = start(erp.clone()).await;
        let backend = backend(&url);

        let rows = backend
            .search_read(
                "product.product",
                &[Condition::ilike("name", "desk")],
                &["name", "list_price"],
                Some(1),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["name"], "Standing Desk");

        let calls = erp.calls.lock().unwrap();
        let methods: Vec<_> = calls
            .iter()
            .map(|c| c["params"]["method"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(methods, vec!["authenticate", "execute_kw", "execute_kw"]);

        let search_args = &calls[1]["params"]["args"];
        assert_eq!(search_args[1], 7);
        assert_eq!(search_args[3], "product.product");
        assert_eq!(search_args[5], json!([[["name", "ilike", "desk"]]]));
        assert_eq!(calls[1]["params"]["args"][6]["limit"], 1);
    }

    #[tokio::test]
    async fn rejected_login_is_authentication_error() {
        let erp = FakeErp {
            reject_login: true,
            ..FakeErp::default()
        };
        let (url, _task) = start(erp).await;
        let err = backend(&url)
            .search("crm.lead", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Authentication(_)));
    }

    #[tokio::test]
    async fn create_and_write() {
        let (url, _task) = start(FakeErp::default()).await;
        let backend = backend(&url);
        let id = backend.create("crm.lead", Record::new()).await.unwrap();
        assert_eq!(id, 11);
        backend.write("crm.lead", id, Record::new()).await.unwrap();
    }

    #[tokio::test]
    async fn remote_error_message_is_surfaced() {
        let (url, _task) = start(FakeErp::default()).await;
        let err = backend(&url)
            .execute_kw("crm.lead", "unlink", json!([[1]]), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Backend call failed: Access denied");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let err = backend("http://127.0.0.1:9")
            .search("crm.lead", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = JsonRpcCredentials {
            url: "https://erp.example.com".into(),
            database: "prod".into(),
            username: "bot".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
