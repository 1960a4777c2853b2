use axum::{extract::State, Json};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    repo,
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user_id: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let username = payload.username.trim().to_string();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request(
            "username and password must not be empty",
        ));
    }

    let password_hash = password::hash_password(&payload.password).map_err(|err| {
        error!(error = %err, "password hashing failed");
        AppError::internal("failed to hash password")
    })?;

    let mut conn = state.db()?;

    // The unique index is the arbiter for duplicate names; a pre-check
    // would race against a concurrent registration of the same username.
    let user = match repo::create_user(&mut conn, &username, &password_hash) {
        Ok(user) => user,
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("username already exists"));
        }
        Err(err) => return Err(err.into()),
    };
    info!(user_id = user.id, username = %user.username, "user registered");

    Ok(Json(RegisterResponse {
        message: "user created successfully".to_string(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;

    // Unknown user and wrong password produce the same response, so the
    // endpoint cannot be used to probe which usernames exist.
    let user = repo::find_user_by_username(&mut conn, &payload.username)?
        .ok_or_else(|| AppError::unauthorized("invalid username or password"))?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("invalid username or password"))?;
    if !valid {
        return Err(AppError::unauthorized("invalid username or password"));
    }

    let token = state.tokens.issue(&user.username, user.id).map_err(|err| {
        error!(error = %err, "token issuance failed");
        AppError::internal("failed to generate token")
    })?;

    info!(user_id = user.id, username = %user.username, "user logged in");

    Ok(Json(LoginResponse {
        message: format!("Hello {}! You are now logged in.", user.username),
        token,
        user_id: user.id,
    }))
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub message: String,
    pub user_id: i64,
}

/// Token smoke check: echoes the identity the gate attached to the request.
pub async fn access(user: AuthenticatedUser) -> Json<AccessResponse> {
    Json(AccessResponse {
        message: format!("Hello {}!", user.username),
        user_id: user.user_id,
    })
}
