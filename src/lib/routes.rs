//! This module includes the fare routes and assembles the router.
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::{debug, error, instrument, warn};

use crate::{
    auth::{self, Claims},
    error::ApiError,
    ledger::{Bus, Transaction},
    request::{BookRequest, NotificationResponseRequest, ScanRequest, TopUpRequest},
    response::{BoardingResponse, MessageResponse, ScanResponse, TopUpResponse},
    state::SharedState,
    submit::FARE_ENDPOINT,
};

/// Builds the full API router around `state`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/register", post(auth::routes::register))
        .route("/tokens", post(auth::routes::authenticate))
        .route(FARE_ENDPOINT, post(scan_qr))
        .route("/topup", post(top_up))
        .route("/transactions", get(transactions))
        .route("/buses", get(buses))
        .route("/book/:bus_number", post(book))
        .route("/respond-notification", post(respond_notification))
        .route("/select-alternative-bus/:bus_number", post(select_alternative))
        .layer(Extension(state))
}

/// Deducts the fare for a scanned bus code. Always answers with a
/// [`ScanResponse`], failures included.
#[instrument(skip_all)]
pub async fn scan_qr(
    Extension(state): Extension<SharedState>,
    claims: Option<Claims>,
    payload: Option<Json<ScanRequest>>,
) -> Json<ScanResponse> {
    let Some(claims) = claims else {
        debug!("scan without a valid token");
        return Json(ScanResponse::rejected(ApiError::MissingCredentials.to_string()));
    };

    let Some(Json(payload)) = payload else {
        warn!("scan from {:?} had no bus_number", claims.sub);
        return Json(ScanResponse::rejected("Invalid request data"));
    };

    let mut state = match state.write() {
        Ok(state) => state,
        Err(err) => {
            error!("error acquiring the lock for app state: {:?}", err);
            return Json(ScanResponse::rejected(format!(
                "Error processing QR code: {}",
                ApiError::OperationFailed
            )));
        }
    };

    match state.ledger.charge_fare(&claims.sub, &payload.bus_number) {
        Ok(message) => Json(ScanResponse::accepted(message)),
        Err(err) => {
            debug!("fare refused for {:?}: {err}", claims.sub);
            Json(ScanResponse::rejected(err.to_string()))
        }
    }
}

/// Credits the rider's balance.
#[instrument(skip(state, payload), fields(usn = %claims.sub))]
pub async fn top_up(
    Extension(state): Extension<SharedState>,
    claims: Claims,
    Json(payload): Json<TopUpRequest>,
) -> Result<Json<TopUpResponse>, ApiError> {
    let mut state = state.write().map_err(|err| {
        error!("error acquiring the lock for app state: {:?}", err);
        ApiError::OperationFailed
    })?;

    let balance = state.ledger.top_up(
        &claims.sub,
        payload.amount,
        payload.payment_method.as_deref(),
    )?;

    Ok(Json(TopUpResponse {
        balance,
        message: format!(
            "Top up successful! ₹{:.2} added to your account. New balance: ₹{balance:.2}",
            payload.amount
        ),
    }))
}

/// Lists the rider's transactions, newest first.
#[instrument(skip(state), fields(usn = %claims.sub))]
pub async fn transactions(
    Extension(state): Extension<SharedState>,
    claims: Claims,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let state = state.read().map_err(|_| ApiError::OperationFailed)?;

    Ok(Json(state.ledger.transactions(&claims.sub)))
}

/// Lists buses that still have free seats.
pub async fn buses(
    Extension(state): Extension<SharedState>,
) -> Result<Json<Vec<Bus>>, ApiError> {
    let state = state.read().map_err(|_| ApiError::OperationFailed)?;

    Ok(Json(state.ledger.available_buses()))
}

/// Reserves seats on a bus.
#[instrument(skip(state, payload), fields(usn = %claims.sub))]
pub async fn book(
    Extension(state): Extension<SharedState>,
    claims: Claims,
    Path(bus_number): Path<String>,
    Json(payload): Json<BookRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut state = state.write().map_err(|err| {
        error!("error acquiring the lock for app state: {:?}", err);
        ApiError::OperationFailed
    })?;

    let message = state.ledger.book_seats(&bus_number, payload.seats)?;

    Ok(Json(MessageResponse { message }))
}

/// Answers a boarding notification for the rider's regular bus.
#[instrument(skip(state, payload), fields(usn = %claims.sub))]
pub async fn respond_notification(
    Extension(state): Extension<SharedState>,
    claims: Claims,
    Json(payload): Json<NotificationResponseRequest>,
) -> Result<Json<BoardingResponse>, ApiError> {
    let mut state = state.write().map_err(|err| {
        error!("error acquiring the lock for app state: {:?}", err);
        ApiError::OperationFailed
    })?;

    let reply = state.ledger.respond(
        &claims.sub,
        &payload.notification_id,
        &payload.response,
    )?;

    Ok(Json(reply.into()))
}

/// Takes a seat on an alternative bus after the regular one filled up.
#[instrument(skip(state), fields(usn = %claims.sub))]
pub async fn select_alternative(
    Extension(state): Extension<SharedState>,
    claims: Claims,
    Path(bus_number): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut state = state.write().map_err(|err| {
        error!("error acquiring the lock for app state: {:?}", err);
        ApiError::OperationFailed
    })?;

    let message = state.ledger.book_alternative(&bus_number)?;

    Ok(Json(MessageResponse { message }))
}
