use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tally_core::User;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/users/me", get(me))
}

/// `GET /api/users/me`: the account behind the bearer token.
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<User>> {
    let user = state
        .db
        .users()
        .get(&caller.id)
        .await?
        // Token outlived its account
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(Json(user))
}
