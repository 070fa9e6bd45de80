//! Sale ledger routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tally_core::{CreateSale, Sale};
use tracing::debug;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list_sales).post(create_sale))
        .route("/sales/{id}", get(get_sale))
}

/// `POST /api/sales`: records a sale and decrements stock, all or nothing.
pub async fn create_sale(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(body): Json<CreateSale>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    debug!(user_id = %caller.id, lines = body.items.len(), "Recording sale");

    let sale = state.db.sales().create_sale(&body).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// `GET /api/sales`, most recent first.
pub async fn list_sales(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.sales().list_sales().await?))
}

/// `GET /api/sales/{id}`
pub async fn get_sale(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Sale>> {
    state
        .db
        .sales()
        .get_sale(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}
