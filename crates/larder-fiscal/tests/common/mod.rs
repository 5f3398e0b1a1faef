//! Shared fixtures: a scriptable mock tax authority and a wired service.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use larder_core::BusinessProfile;
use larder_db::{Database, DbConfig};
use larder_fiscal::{FiscalConfig, FiscalService, TenantIdentity};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub type Reply = (StatusCode, String);

type Responder = dyn Fn(&str, &Value) -> Reply + Send + Sync;

/// One request as the mock authority saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

struct MockState {
    responder: Box<Responder>,
    requests: Mutex<Vec<Recorded>>,
}

/// Authority stand-in bound to `127.0.0.1:0`.
pub struct MockAuthority {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockAuthority {
    /// Starts a server answering every request with `responder(path, body)`.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let state = Arc::new(MockState {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        MockAuthority {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Accepts everything with an empty `data` object.
    pub async fn accepting() -> Self {
        Self::start(|_, _| ok(json!({}))).await
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (status, reply) = (state.responder)(&path, &body);

    state.requests.lock().unwrap().push(Recorded {
        path,
        headers,
        body,
    });

    (status, [(header::CONTENT_TYPE, "application/json")], reply)
}

// =============================================================================
// Replies
// =============================================================================

pub fn ok(data: Value) -> Reply {
    (
        StatusCode::OK,
        json!({
            "resultCd": "000",
            "resultMsg": "It is succeeded",
            "resultDt": "20261018101500",
            "data": data
        })
        .to_string(),
    )
}

pub fn reject(code: &str, message: &str) -> Reply {
    (
        StatusCode::OK,
        json!({ "resultCd": code, "resultMsg": message, "data": null }).to_string(),
    )
}

pub fn http_error(status: StatusCode) -> Reply {
    (status, "upstream unavailable".to_string())
}

// =============================================================================
// Wiring
// =============================================================================

/// Valid configuration pointing at `base_url`, with millisecond backoff.
pub fn config_for(base_url: &str) -> FiscalConfig {
    let mut config = FiscalConfig::default();
    config.authority.base_url = base_url.to_string();
    config.authority.backoff_base_ms = 5;
    config.authority.request_timeout_secs = 2;
    config.tenant = TenantIdentity {
        tin: "P051234567X".to_string(),
        branch_id: "00".to_string(),
        cmc_key: "cmc-secret".to_string(),
    };
    config.business = BusinessProfile {
        name: "Mama's Kitchen".to_string(),
        address: "Moi Avenue".to_string(),
        phone: "0700000000".to_string(),
        email: "info@example.com".to_string(),
        receipt_top_message: "Karibu".to_string(),
        receipt_bottom_message: "Asante".to_string(),
    };
    config
}

pub async fn service_for(authority: &MockAuthority) -> FiscalService {
    let config = config_for(&authority.base_url);
    config.validate().unwrap();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    FiscalService::new(db, Arc::new(config)).unwrap()
}
