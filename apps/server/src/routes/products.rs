//! Catalog routes.
//!
//! Any authenticated user may read the catalog; writes need a manager.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tally_core::{NewProduct, Product, DEFAULT_LOW_STOCK_THRESHOLD};

use super::{query_i64, QueryParams};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/low-stock", get(low_stock))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// `GET /api/products`, newest first.
pub async fn list_products(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().list().await?))
}

/// `POST /api/products`
pub async fn create_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(body): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    caller.require_manager()?;

    let product = state.db.products().create(&body).await?;
    tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /api/products/low-stock?threshold=N`
pub async fn low_stock(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let threshold = query_i64(&params, "threshold", DEFAULT_LOW_STOCK_THRESHOLD)?;
    Ok(Json(state.db.products().list_low_stock(threshold).await?))
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

/// `PUT /api/products/{id}`: full replacement of the editable fields.
pub async fn update_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<NewProduct>,
) -> ApiResult<Json<Product>> {
    caller.require_manager()?;
    Ok(Json(state.db.products().update(&id, &body).await?))
}

/// `DELETE /api/products/{id}`
///
/// Products that appear on recorded sales can't be deleted (409).
pub async fn delete_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require_manager()?;

    state.db.products().delete(&id).await?;
    tracing::info!(product_id = %id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}
