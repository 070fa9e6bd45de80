//! Manager reports.
//!
//! Windows are given as calendar dates (`YYYY-MM-DD`, UTC) with both ends
//! inclusive, and turned into the half-open instant range
//! `[from 00:00, day after to 00:00)` the report queries take.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tally_core::{DailySales, SalesSummary, TopProduct, DEFAULT_TOP_PRODUCTS_LIMIT};

use super::{query_i64, QueryParams};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/summary", get(summary))
        .route("/reports/daily", get(daily))
        .route("/reports/top-products", get(top_products))
}

/// Half-open reporting window in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    /// Reads `from` and `to` from the query string.
    pub fn from_params(params: &QueryParams) -> ApiResult<Self> {
        let from = parse_date(params, "from")?;
        let to = parse_date(params, "to")?;

        if from > to {
            return Err(ApiError::validation("from must not be after to"));
        }

        let end = to
            .succ_opt()
            .ok_or_else(|| ApiError::validation("to is out of range"))?;

        Ok(DateWindow {
            from: from.and_time(NaiveTime::MIN).and_utc(),
            to: end.and_time(NaiveTime::MIN).and_utc(),
        })
    }
}

fn parse_date(params: &QueryParams, key: &str) -> ApiResult<NaiveDate> {
    let raw = params
        .get(key)
        .ok_or_else(|| ApiError::validation(format!("{key} is required")))?;

    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("{key} must be a date (YYYY-MM-DD)")))
}

/// `GET /api/reports/summary?from=&to=`
pub async fn summary(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<SalesSummary>> {
    caller.require_manager()?;
    let window = DateWindow::from_params(&params)?;

    Ok(Json(state.db.reports().summary(window.from, window.to).await?))
}

/// `GET /api/reports/daily?from=&to=`
pub async fn daily(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<DailySales>>> {
    caller.require_manager()?;
    let window = DateWindow::from_params(&params)?;

    Ok(Json(state.db.reports().daily(window.from, window.to).await?))
}

/// `GET /api/reports/top-products?from=&to=&limit=`
pub async fn top_products(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    caller.require_manager()?;
    let window = DateWindow::from_params(&params)?;
    let limit = query_i64(&params, "limit", DEFAULT_TOP_PRODUCTS_LIMIT)?;

    Ok(Json(
        state
            .db
            .reports()
            .top_products(window.from, window.to, limit)
            .await?,
    ))
}
