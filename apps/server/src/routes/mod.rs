//! HTTP routes, one file per area.
//!
//! Every handler returns [`ApiResult`](crate::error::ApiResult), so failures
//! share the `{"error", "message"}` body.

use std::collections::HashMap;

use axum::routing::get;
use axum::Router;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub mod auth;
pub mod health;
pub mod products;
pub mod reports;
pub mod sales;
pub mod users;

/// All routes, before state is attached.
pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(products::router())
        .merge(sales::router())
        .merge(reports::router());

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
}

/// Query parameters are read as strings and parsed here so a bad value gets
/// the JSON error body instead of the extractor's plain-text rejection.
pub(crate) type QueryParams = HashMap<String, String>;

/// Parses an optional integer query parameter.
pub(crate) fn query_i64(params: &QueryParams, key: &str, default: i64) -> ApiResult<i64> {
    match params.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::validation(format!("{key} must be an integer"))),
        None => Ok(default),
    }
}
