//! # Tally POS Server
//!
//! HTTP API over the Tally POS catalog, sale ledger and reports.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Server Routes                                   │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  /api/auth     │  │  /api/products │  │  /api/sales                ││
//! │  │                │  │                │  │                            ││
//! │  │ • login        │  │ • list/get     │  │ • POST (the ledger)        ││
//! │  │ • register     │  │ • create/update│  │ • list / get               ││
//! │  │                │  │ • delete       │  │                            ││
//! │  │  /api/users/me │  │ • low-stock    │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │  /api/reports  │  │  /health       │                                │
//! │  │ • summary      │  │                │                                │
//! │  │ • daily        │  │                │                                │
//! │  │ • top-products │  │                │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  Layers: TraceLayer (request spans) → CorsLayer (any origin)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `TALLY_DB_PATH` - SQLite database file (default: data/tally.db)
//! - `PORT` - HTTP port (default: 8080)
//! - `BIND_ADDR` - Listen address (default: 0.0.0.0)
//! - `JWT_SECRET` - Secret for JWT signing
//! - `JWT_LIFETIME_SECS` - Token lifetime (default: 86400)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `DB_BUSY_TIMEOUT_SECS` - Write lock wait (default: 5)

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the full HTTP router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    routes::router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tally_core::{NewUser, Role};
    use tally_db::{Database, DbConfig};
    use tower::ServiceExt;

    use crate::auth::JwtManager;
    use crate::{build_router, AppState};

    /// Router over a fresh in-memory database.
    pub async fn test_app() -> (Router, AppState) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, JwtManager::new("test-secret", 3600));
        (build_router(state.clone()), state)
    }

    /// Creates a user with the given role and returns a bearer token for it.
    pub async fn token_for(state: &AppState, role: Role) -> String {
        let count = state.db.users().count().await.unwrap();
        let user = state
            .db
            .users()
            .create(&NewUser {
                name: format!("{role} {count}"),
                email: format!("{role}{count}@example.com"),
                password: "secret1".to_string(),
                role,
            })
            .await
            .unwrap();
        state.jwt.generate_token(&user).unwrap()
    }

    /// Sends one request through the router and decodes the body.
    ///
    /// Non-JSON bodies come back as a JSON string.
    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}
