//! Mock admin backend for integration tests
//!
//! Serves the permission, role and session endpoints under `/api`. Creating
//! a role is guarded by `admin:roles:write`: it answers 403 until a
//! permission with that resource has been attached to some role.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const GUARDED_RESOURCE: &str = "admin:roles:write";

/// Mock admin backend with call counters
pub struct MockAdmin {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockAdminState>,
}

struct MockAdminState {
    permissions: Mutex<Vec<Value>>,
    roles: Vec<Value>,
    /// Permission ids attached to any role
    granted: Mutex<HashSet<String>>,
    /// `(role id, request body)` per attach call
    attachments: Mutex<Vec<(String, Value)>>,
    next_id: AtomicI64,
    permission_lookups: AtomicU32,
    permission_creates: AtomicU32,
    role_lookups: AtomicU32,
    session_fetches: AtomicU32,
}

impl MockAdmin {
    /// Start with the default roles and no permissions
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(Vec::new(), default_roles()).await
    }

    /// Start with pre-existing permission records
    pub async fn start_with_permissions(permissions: Vec<Value>) -> anyhow::Result<Self> {
        Self::start_inner(permissions, default_roles()).await
    }

    /// Start with a custom role list
    pub async fn start_with_roles(roles: Vec<Value>) -> anyhow::Result<Self> {
        Self::start_inner(Vec::new(), roles).await
    }

    async fn start_inner(permissions: Vec<Value>, roles: Vec<Value>) -> anyhow::Result<Self> {
        let state = Arc::new(MockAdminState {
            permissions: Mutex::new(permissions),
            roles,
            granted: Mutex::new(HashSet::new()),
            attachments: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            permission_lookups: AtomicU32::new(0),
            permission_creates: AtomicU32::new(0),
            role_lookups: AtomicU32::new(0),
            session_fetches: AtomicU32::new(0),
        });

        let app = Router::new()
            .route(
                "/api/admin/permissions",
                routing::get(handle_list_permissions).post(handle_create_permission),
            )
            .route("/api/admin/roles", routing::get(handle_list_roles).post(handle_create_role))
            .route("/api/admin/roles/{id}/permissions", routing::post(handle_attach))
            .route("/api/admin/settings", routing::get(handle_broken))
            .route("/api/auth/me", routing::get(handle_session))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for the admin client; endpoints are appended to `/api`
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn permission_lookups(&self) -> u32 {
        self.state.permission_lookups.load(Ordering::Relaxed)
    }

    pub fn permission_creates(&self) -> u32 {
        self.state.permission_creates.load(Ordering::Relaxed)
    }

    pub fn role_lookups(&self) -> u32 {
        self.state.role_lookups.load(Ordering::Relaxed)
    }

    pub fn session_fetches(&self) -> u32 {
        self.state.session_fetches.load(Ordering::Relaxed)
    }

    /// Every attach call received so far
    pub fn attachments(&self) -> Vec<(String, Value)> {
        self.state.attachments.lock().unwrap().clone()
    }

    /// Permission records currently stored
    pub fn permissions(&self) -> Vec<Value> {
        self.state.permissions.lock().unwrap().clone()
    }
}

impl Drop for MockAdmin {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn default_roles() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "editor" }),
        json!({ "id": 2, "name": "superadmin", "description": "Full access" }),
    ]
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn grants_guarded(permission: &Value) -> bool {
    permission["resource"] == GUARDED_RESOURCE || permission["name"] == GUARDED_RESOURCE
}

// -- Handlers --

async fn handle_list_permissions(State(state): State<Arc<MockAdminState>>) -> Json<Value> {
    state.permission_lookups.fetch_add(1, Ordering::Relaxed);
    let permissions = state.permissions.lock().unwrap().clone();
    Json(json!({ "data": permissions }))
}

async fn handle_create_permission(
    State(state): State<Arc<MockAdminState>>,
    Json(mut body): Json<Value>,
) -> impl IntoResponse {
    state.permission_creates.fetch_add(1, Ordering::Relaxed);

    let id = state.next_id.fetch_add(1, Ordering::Relaxed);
    body["id"] = json!(id);
    state.permissions.lock().unwrap().push(body.clone());

    (StatusCode::CREATED, Json(body))
}

async fn handle_list_roles(State(state): State<Arc<MockAdminState>>) -> Json<Value> {
    state.role_lookups.fetch_add(1, Ordering::Relaxed);
    Json(Value::Array(state.roles.clone()))
}

async fn handle_create_role(State(state): State<Arc<MockAdminState>>, Json(body): Json<Value>) -> impl IntoResponse {
    let allowed = {
        let granted = state.granted.lock().unwrap();
        state
            .permissions
            .lock()
            .unwrap()
            .iter()
            .any(|p| grants_guarded(p) && granted.contains(&id_string(&p["id"])))
    };

    if !allowed {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": format!("Missing permission {GUARDED_RESOURCE}") })),
        );
    }

    let mut role = body;
    role["id"] = json!(state.next_id.fetch_add(1, Ordering::Relaxed));
    (StatusCode::CREATED, Json(json!({ "data": role })))
}

async fn handle_attach(
    State(state): State<Arc<MockAdminState>>,
    Path(role_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    if let Some(ids) = body["permissionIds"].as_array() {
        let mut granted = state.granted.lock().unwrap();
        granted.extend(ids.iter().map(id_string));
    }
    state.attachments.lock().unwrap().push((role_id, body));

    StatusCode::NO_CONTENT
}

async fn handle_session(State(state): State<Arc<MockAdminState>>) -> Json<Value> {
    state.session_fetches.fetch_add(1, Ordering::Relaxed);
    let granted: Vec<String> = state.granted.lock().unwrap().iter().cloned().collect();

    Json(json!({
        "data": {
            "id": 7,
            "email": "operator@example.com",
            "roles": ["superadmin"],
            "permissions": granted,
        }
    }))
}

async fn handle_broken() -> impl IntoResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": { "message": "database unavailable" } })),
    )
}
