//! Module containing everything pertaining to rider authentication.
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt, TypedHeader,
};
use base64::prelude::{Engine, BASE64_URL_SAFE};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use openssl::{hash::MessageDigest, memcmp, pkcs5, rand};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::ApiError;

pub mod routes;

const PBKDF2_ITERATIONS: usize = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// The encoding and decoding keys used for signing JWTs.
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    /// Creates the encoding and decoding keys from an HS256 secret.
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// A lazy evaluated static for loading the JWT keys from the JWT_SECRET
/// environment variable.
static KEYS: Lazy<Keys> = Lazy::new(|| {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    Keys::new(secret.as_bytes())
});

/// The claims to store in the JWT. `sub` is the rider's USN.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    exp: usize,
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::MissingCredentials)?;
        let token_data =
            jsonwebtoken::decode::<Claims>(bearer.token(), &KEYS.decoding, &Validation::default())
                .map_err(|_| ApiError::InvalidToken)?;

        Ok(token_data.claims)
    }
}

/// Creates a new JWT for `usn`. The token will expire in one hour.
pub fn create_token(
    usn: &str,
    creation_time: chrono::DateTime<chrono::Utc>,
) -> Result<String, ApiError> {
    let exp = creation_time.timestamp() + (60 * 60);
    let claims = Claims {
        sub: usn.to_owned(),
        exp: exp as usize,
    };

    jsonwebtoken::encode(&Header::default(), &claims, &KEYS.encoding).map_err(|err| {
        error!("failed to sign token: {err}");
        ApiError::OperationFailed
    })
}

/// Hashes a password with PBKDF2-HMAC-SHA256 and a random salt. The result
/// is `iterations$salt$hash`, both parts Base64 encoded.
pub fn hash_password(password: &str) -> Result<String, openssl::error::ErrorStack> {
    let mut salt = [0u8; SALT_LEN];
    rand::rand_bytes(&mut salt)?;

    let mut hash = [0u8; HASH_LEN];
    pkcs5::pbkdf2_hmac(
        password.as_bytes(),
        &salt,
        PBKDF2_ITERATIONS,
        MessageDigest::sha256(),
        &mut hash,
    )?;

    Ok(format!(
        "{PBKDF2_ITERATIONS}${}${}",
        BASE64_URL_SAFE.encode(salt),
        BASE64_URL_SAFE.encode(hash)
    ))
}

/// Checks `password` against a hash produced by [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(iterations), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        warn!("stored password hash is malformed");
        return false;
    };

    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<usize>(),
        BASE64_URL_SAFE.decode(salt),
        BASE64_URL_SAFE.decode(expected),
    ) else {
        warn!("stored password hash is malformed");
        return false;
    };

    let mut hash = vec![0u8; expected.len()];
    if pkcs5::pbkdf2_hmac(
        password.as_bytes(),
        &salt,
        iterations,
        MessageDigest::sha256(),
        &mut hash,
    )
    .is_err()
    {
        error!("failed to derive password hash");
        return false;
    }

    !expected.is_empty() && memcmp::eq(&hash, &expected)
}
