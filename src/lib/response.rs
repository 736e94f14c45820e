//! This module declares all types that may be used as response payloads.
use serde::{Deserialize, Serialize};

use crate::ledger::{BoardingReply, Bus};

/// Answer to a scanned code. `message` is optional on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScanResponse {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthenticateResponse {
    pub token: String,
}

/// Body of every non-2xx answer from the API.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TopUpResponse {
    pub balance: f64,
    pub message: String,
}

/// Answer to a boarding notification. `alternatives` is only filled in when
/// the rider's regular bus is full.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BoardingResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Bus>,
}

impl From<BoardingReply> for BoardingResponse {
    fn from(reply: BoardingReply) -> Self {
        let message = reply.message().to_owned();

        match reply {
            BoardingReply::Full { alternatives } => Self {
                success: false,
                message,
                alternatives,
            },
            BoardingReply::Confirmed | BoardingReply::Declined => Self {
                success: true,
                message,
                alternatives: Vec::new(),
            },
        }
    }
}
