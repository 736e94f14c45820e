//! Errors returned by the HTTP API.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::{ledger::LedgerError, response::ErrorResponse};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Please login first")]
    MissingCredentials,
    #[error("Invalid USN or password")]
    InvalidCredentials,
    #[error("Invalid access token")]
    InvalidToken,
    #[error("{0}")]
    Rejected(#[from] LedgerError),
    #[error("Operation could not be completed")]
    OperationFailed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingCredentials => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Rejected(LedgerError::DuplicateUsn) => StatusCode::CONFLICT,
            Self::Rejected(LedgerError::UserNotFound) => StatusCode::NOT_FOUND,
            Self::Rejected(LedgerError::NotEnoughSeats { .. }) => StatusCode::CONFLICT,
            Self::Rejected(LedgerError::BusFull) => StatusCode::CONFLICT,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: format!("{self}"),
        });

        (status, body).into_response()
    }
}
