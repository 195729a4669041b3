//! Credentials for the ClickHouse HTTP interface and the inbound API token.
//!
//! ClickHouse accepts either of:
//! - X-ClickHouse-User / X-ClickHouse-Key headers
//! - Authorization: Basic base64(user:password)
//!
//! Inbound requests to `/api/*` carry `Authorization: Bearer <token>` when
//! an API token is configured.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::config::AuthScheme;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("ClickHouse user is required")]
    MissingUser,
    #[error("Credential contains characters not allowed in a header: {0}")]
    InvalidHeaderValue(&'static str),
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid bearer token")]
    InvalidToken,
}

/// ClickHouse credentials, rendered as request headers.
#[derive(Clone)]
pub struct ClickHouseAuth {
    user: String,
    password: String,
    scheme: AuthScheme,
}

impl ClickHouseAuth {
    pub fn new(user: &str, password: &str, scheme: AuthScheme) -> Result<Self, AuthError> {
        if user.is_empty() {
            return Err(AuthError::MissingUser);
        }
        let auth = Self {
            user: user.to_string(),
            password: password.to_string(),
            scheme,
        };
        // Surface bad characters at startup rather than on the first query.
        auth.to_header_map()?;
        Ok(auth)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Build the auth headers for one request.
    pub fn to_header_map(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        match self.scheme {
            AuthScheme::Headers => {
                headers.insert(
                    "X-ClickHouse-User",
                    HeaderValue::from_str(&self.user)
                        .map_err(|_| AuthError::InvalidHeaderValue("user"))?,
                );
                if !self.password.is_empty() {
                    let mut key = HeaderValue::from_str(&self.password)
                        .map_err(|_| AuthError::InvalidHeaderValue("password"))?;
                    key.set_sensitive(true);
                    headers.insert("X-ClickHouse-Key", key);
                }
            }
            AuthScheme::Basic => {
                let token = BASE64.encode(format!("{}:{}", self.user, self.password));
                let mut value = HeaderValue::from_str(&format!("Basic {token}"))
                    .map_err(|_| AuthError::InvalidHeaderValue("basic"))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for ClickHouseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseAuth")
            .field("user", &self.user)
            .field("password", &"***")
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Check an inbound `Authorization` header against the configured token.
///
/// Absent or non-bearer header is `MissingToken` (401); a bearer token that
/// does not match is `InvalidToken` (403).
pub fn check_bearer(header: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

/// Byte comparison whose running time does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
