//! In-process mock of the medkit REST API for unit tests
//!
//! Every request is recorded. Canned routes answer 401 unless the bearer
//! token is one the server currently accepts, which is how tests expire an
//! access token: store it client-side without telling the server about it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
    public: bool,
    delay: Duration,
}

struct Grant {
    access: String,
    refresh: String,
    accept_access: bool,
}

#[derive(Default)]
pub struct MockState {
    accepted: Mutex<HashSet<String>>,
    grants: Mutex<HashMap<String, Grant>>,
    routes: Mutex<HashMap<(Method, String), Canned>>,
    refresh_delay: Mutex<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
    refresh_calls: AtomicUsize,
}

impl MockState {
    /// Treat `token` as a live access token.
    pub fn accept(&self, token: &str) {
        self.accepted.lock().unwrap().insert(token.to_string());
    }

    /// Exchange `refresh` for a new pair whose access token is accepted.
    pub fn grant(&self, refresh: &str, new_access: &str, new_refresh: &str) {
        self.insert_grant(refresh, new_access, new_refresh, true);
    }

    /// Exchange `refresh` for a pair whose access token is still rejected.
    pub fn grant_rejected(&self, refresh: &str, new_access: &str, new_refresh: &str) {
        self.insert_grant(refresh, new_access, new_refresh, false);
    }

    fn insert_grant(&self, refresh: &str, access: &str, new_refresh: &str, accept_access: bool) {
        self.grants.lock().unwrap().insert(
            refresh.to_string(),
            Grant {
                access: access.to_string(),
                refresh: new_refresh.to_string(),
                accept_access,
            },
        );
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    /// Canned JSON answer for an authenticated route.
    pub fn on(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        self.route(method, path, status, "application/json", body.to_string().into_bytes(), false);
    }

    /// Canned JSON answer for a route that needs no token.
    pub fn on_public(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        self.route(method, path, status, "application/json", body.to_string().into_bytes(), true);
    }

    /// Canned binary answer for an authenticated route.
    pub fn on_bytes(&self, method: Method, path: &str, content_type: &'static str, body: &[u8]) {
        self.route(method, path, 200, content_type, body.to_vec(), false);
    }

    fn route(
        &self,
        method: Method,
        path: &str,
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
        public: bool,
    ) {
        self.routes.lock().unwrap().insert(
            (method, path.to_string()),
            Canned {
                status: StatusCode::from_u16(status).unwrap(),
                content_type,
                body,
                public,
                delay: Duration::ZERO,
            },
        );
    }

    /// Hold every answer of an existing route for `delay`, 401s included.
    pub fn delay(&self, method: Method, path: &str, delay: Duration) {
        if let Some(canned) = self.routes.lock().unwrap().get_mut(&(method, path.to_string())) {
            canned.delay = delay;
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests to `path`.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no request recorded")
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new()
            .fallback(handle)
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

fn unauthorized(message: &str) -> Response {
    let body = serde_json::json!({
        "status": 401,
        "error": "Unauthorized",
        "message": message,
    });
    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(uri.path())
        .to_string();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let json_body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        authorization: authorization.clone(),
        body: json_body.clone(),
    });

    if method == Method::POST && path == "/auth/refresh" {
        return refresh(&state, &json_body).await;
    }

    let canned = state
        .routes
        .lock()
        .unwrap()
        .get(&(method, path))
        .cloned();
    let Some(canned) = canned else {
        return (StatusCode::NOT_FOUND, "no such route").into_response();
    };

    tokio::time::sleep(canned.delay).await;

    if !canned.public {
        let token = authorization
            .as_deref()
            .and_then(|v| v.strip_prefix("Bearer "));
        let live = token.is_some_and(|t| state.accepted.lock().unwrap().contains(t));
        if !live {
            return unauthorized("Access token expired");
        }
    }

    (
        canned.status,
        [(header::CONTENT_TYPE, canned.content_type)],
        canned.body,
    )
        .into_response()
}

async fn refresh(state: &MockState, body: &serde_json::Value) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.refresh_delay.lock().unwrap();
    tokio::time::sleep(delay).await;

    let presented = body["refreshToken"].as_str().unwrap_or_default();
    let pair = {
        let grants = state.grants.lock().unwrap();
        grants
            .get(presented)
            .map(|g| (g.access.clone(), g.refresh.clone(), g.accept_access))
    };
    match pair {
        Some((access, refresh, accept)) => {
            if accept {
                state.accept(&access);
            }
            axum::Json(serde_json::json!({
                "accessToken": access,
                "refreshToken": refresh,
                "tokenType": "Bearer",
            }))
            .into_response()
        }
        None => unauthorized("Refresh token invalid"),
    }
}
