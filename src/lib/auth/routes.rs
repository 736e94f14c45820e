//! This module includes the routes riders use to sign up and sign in.
use axum::{http::StatusCode, Extension, Json};
use tracing::{debug, error, instrument, warn};

use crate::{
    auth::{create_token, hash_password, verify_password},
    error::ApiError,
    request::{AuthenticateRequest, RegisterRequest},
    response::{AuthenticateResponse, MessageResponse},
    state::SharedState,
};

/// Creates a rider account with an empty balance.
///
/// The password is hashed on the blocking pool with no lock held. The USN is
/// checked again once the write lock is taken.
#[instrument(skip(state, payload))]
pub async fn register(
    Extension(state): Extension<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    debug!("registering rider {:?}", payload.usn);

    {
        let app = state.read().map_err(|_| ApiError::OperationFailed)?;
        app.ledger.check_registration(&payload).map_err(|err| {
            warn!("registration rejected: {err}");
            err
        })?;
    }

    let password = payload.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| {
            error!("password hashing task failed: {err}");
            ApiError::OperationFailed
        })?
        .map_err(|err| {
            error!("failed to hash password: {err}");
            ApiError::OperationFailed
        })?;

    let mut app = state.write().map_err(|err| {
        error!("error acquiring the lock for app state: {:?}", err);
        ApiError::OperationFailed
    })?;

    app.ledger.register(payload, password_hash).map_err(|err| {
        warn!("registration rejected: {err}");
        err
    })?;

    let body = Json(MessageResponse {
        message: "Registration successful! Please login.".to_owned(),
    });

    Ok((StatusCode::CREATED, body))
}

/// Checks a rider's password and hands out a signed access token.
#[instrument(skip(state, payload))]
pub async fn authenticate(
    Extension(state): Extension<SharedState>,
    Json(payload): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    debug!("authenticating rider {:?}", payload.usn);

    if payload.usn.is_empty() || payload.password.is_empty() {
        warn!("rider attempted to authenticate without credentials");
        return Err(ApiError::MissingCredentials);
    }

    let stored = state
        .read()
        .map_err(|_| ApiError::OperationFailed)?
        .ledger
        .password_hash(&payload.usn);

    let Some(stored) = stored else {
        warn!("rider {:?} is not registered", payload.usn);
        return Err(ApiError::InvalidCredentials);
    };

    let password = payload.password.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|err| {
            error!("password check task failed: {err}");
            ApiError::OperationFailed
        })?;

    if !verified {
        warn!("rider {:?} failed to authenticate", payload.usn);
        return Err(ApiError::InvalidCredentials);
    }

    let token = create_token(&payload.usn, chrono::Utc::now())?;

    Ok(Json(AuthenticateResponse { token }))
}
