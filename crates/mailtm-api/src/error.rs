use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the Mail.tm API
#[derive(Error, Debug)]
pub enum Error {
    /// 400: something in the payload is missing, or there is no payload at all
    #[error("Missing argument (400): {0}")]
    MissingArgument(String),

    /// 401: the bearer token is wrong or absent
    #[error("Account token invalid (401): {0}")]
    AccountTokenInvalid(String),

    /// 404: the account, domain or message does not exist
    #[error("Entity not found (404): {0}")]
    EntityNotFound(String),

    /// 405: wrong verb for the path
    #[error("Method not allowed (405): {0}")]
    MethodNotAllowed(String),

    /// 418: the service refused to process the request
    #[error("Refused to process (418): {0}")]
    RefusedToProcess(String),

    /// 422: payload was well formed but rejected (short username, bad domain, ...)
    #[error("Entity not processable (422): {0}")]
    EntityNotProcessable(String),

    /// 429: more than 8 requests per second
    #[error("Rate limited (429): {0}")]
    RateLimited(String),

    /// Any other non-success status
    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client session was closed; no further requests are issued
    #[error("Client session is closed")]
    Closed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Pagination hit the page limit before reaching the reported total
    #[error("Listing of {path} truncated: fetched {fetched} of {total} items")]
    Truncated {
        path: String,
        fetched: usize,
        total: usize,
    },
}

/// Error body shapes returned by the API (JSON-LD problem or plain JWT error)
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default, rename = "hydra:description")]
    description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Error {
    /// Build the error matching an HTTP status and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .detail
            .or(parsed.description)
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(status).to_string());

        match status {
            400 => Error::MissingArgument(message),
            401 => Error::AccountTokenInvalid(message),
            404 => Error::EntityNotFound(message),
            405 => Error::MethodNotAllowed(message),
            418 => Error::RefusedToProcess(message),
            422 => Error::EntityNotProcessable(message),
            429 => Error::RateLimited(message),
            _ => Error::Unexpected { status, message },
        }
    }

    /// HTTP status behind this error, if there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::MissingArgument(_) => Some(400),
            Error::AccountTokenInvalid(_) => Some(401),
            Error::EntityNotFound(_) => Some(404),
            Error::MethodNotAllowed(_) => Some(405),
            Error::RefusedToProcess(_) => Some(418),
            Error::EntityNotProcessable(_) => Some(422),
            Error::RateLimited(_) => Some(429),
            Error::Unexpected { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Json(_)
            | Error::Closed
            | Error::InvalidArgument(_)
            | Error::Truncated { .. } => None,
        }
    }

    /// Whether this is a 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntityNotFound(_))
    }

    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Unexpected { status, .. } => (500..=599).contains(status),
            Error::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        400 => "Something in the payload is missing, or the payload isn't there at all",
        401 => "The token is wrong or the request carries no bearer token",
        404 => "The account or message you are trying to access does not exist",
        405 => "Wrong method for this path",
        418 => "The server is a teapot and refused to process the request",
        422 => "The payload was rejected (address too short, unknown domain, ...)",
        429 => "More than 8 requests per second, delay the request by one second",
        _ => "Unknown error",
    }
}
