//! Login and staff registration.
//!
//! Registration is open while the users table is empty so the first manager
//! can be created; after that only managers may register accounts.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tally_core::{NewUser, Role, User};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// `manager` or `cashier`
    pub role: String,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .db
        .users()
        .authenticate(&body.email, &body.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let token = state.jwt.generate_token(&user)?;
    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt.lifetime_secs(),
        user,
    }))
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let bootstrap = state.db.users().count().await? == 0;
    if !bootstrap {
        AuthUser::from_headers(&state.jwt, &headers)?.require_manager()?;
    }

    let role: Role = body.role.parse()?;
    if bootstrap && role != Role::Manager {
        return Err(ApiError::validation("The first account must be a manager"));
    }

    let user = state
        .db
        .users()
        .create(&NewUser {
            name: body.name,
            email: body.email,
            password: body.password,
            role,
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, bootstrap, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}
