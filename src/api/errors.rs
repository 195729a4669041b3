//! Error types for the ClickHouse HTTP client.

use thiserror::Error;

/// ClickHouse exception codes worth another attempt.
const TRANSIENT_CODES: &[u32] = &[
    159, // TIMEOUT_EXCEEDED
    202, // TOO_MANY_SIMULTANEOUS_QUERIES
    209, // SOCKET_TIMEOUT
    210, // NETWORK_ERROR
    242, // TABLE_IS_READ_ONLY
    319, // UNKNOWN_STATUS_OF_INSERT
];

#[derive(Error, Debug)]
pub enum ClickHouseError {
    #[error("ClickHouse error {status_code} (code {code:?}): {message}")]
    Server {
        status_code: u16,
        code: Option<u32>,
        message: String,
    },

    #[error("Rate limited (retry after {retry_after}s)")]
    RateLimited { retry_after: u64 },

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl ClickHouseError {
    /// Parse an error from a failed ClickHouse response.
    ///
    /// The code comes from the `X-ClickHouse-Exception-Code` header when
    /// present, else from the `Code: N. DB::Exception: ...` body prefix.
    pub fn from_response(status_code: u16, code_header: Option<&str>, body: &str) -> Self {
        let body = body.trim();
        let code = code_header
            .and_then(|h| h.trim().parse::<u32>().ok())
            .or_else(|| parse_exception_code(body));
        let message = parse_exception_message(body).to_string();

        match (status_code, code) {
            (401 | 403, _) | (_, Some(192 | 194 | 516)) => Self::Authentication(message),
            (_, Some(60 | 81)) => Self::NotFound(message),
            (_, Some(62)) => Self::Syntax(message),
            (429, _) => Self::RateLimited { retry_after: 1 },
            _ => Self::Server {
                status_code,
                code,
                message,
            },
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_) => true,
            Self::Server {
                status_code: 500..=599,
                code,
                ..
            } => code.map_or(true, |c| TRANSIENT_CODES.contains(&c)),
            _ => false,
        }
    }
}

fn parse_exception_code(body: &str) -> Option<u32> {
    let rest = body.strip_prefix("Code:")?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_exception_message(body: &str) -> &str {
    match body.find("DB::Exception:") {
        Some(idx) => body[idx + "DB::Exception:".len()..].trim(),
        None => body,
    }
}
