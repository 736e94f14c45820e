//! This module declares all types that may be used as request payloads.
use serde::{Deserialize, Serialize};

/// Body of `POST /scan-qr`. The decoded QR text is forwarded verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub bus_number: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub usn: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub bus_number: Option<String>,
    #[serde(default)]
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthenticateRequest {
    pub usn: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TopUpRequest {
    pub amount: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Body of `POST /book/:bus_number`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BookRequest {
    pub seats: i64,
}

/// Body of `POST /respond-notification`. Only `"yes"` claims a seat.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotificationResponseRequest {
    pub notification_id: String,
    pub response: String,
}
