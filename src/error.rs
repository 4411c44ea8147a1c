use axum::{http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Deserialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// Reason Google reports when a watch channel id is still bound to a live subscription.
pub const CHANNEL_ID_NOT_UNIQUE: &str = "channelIdNotUnique";

#[derive(Debug, ThisError)]
pub enum CalpushError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Persistence error: {0}")]
    Persistence(SqlxError),

    #[error("OAuth2 token request failed: {0}")]
    Oauth2Request(String),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("Calendar API error: {0}")]
    Calendar(#[from] CalendarApiError),

    #[error("channel not found")]
    ChannelNotFound,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("sync cursor for calendar {calendar_id} is missing or expired; full resync required")]
    SyncCursorInvalid { calendar_id: String },

    #[error("event listing for calendar {0} ended without a sync token")]
    MissingSyncToken(String),

    #[error("channel id {channel_id} still in use after {attempts} recovery attempts")]
    CollisionUnresolved { channel_id: String, attempts: u32 },
}

impl CalpushError {
    /// Transport-level failures that may succeed when sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            CalpushError::Oauth2Request(_) => true,
            CalpushError::Reqwest(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CalpushError::ChannelNotFound | CalpushError::UserNotFound(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CalpushError::ChannelNotFound | CalpushError::UserNotFound(_) => StatusCode::NOT_FOUND,
            CalpushError::Persistence(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CalpushError::OauthFlow(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for CalpushError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => CalpushError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => CalpushError::Oauth2Request(req_e.to_string()),
            RequestTokenError::Parse(parse_err, _body) => {
                CalpushError::Json(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => CalpushError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for CalpushError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Unknown and forged webhook triples share one body.
        let message = match &self {
            CalpushError::ChannelNotFound | CalpushError::UserNotFound(_) => {
                "not found".to_string()
            }
            CalpushError::Persistence(_) => "could not store the requested change".to_string(),
            CalpushError::OauthFlow(msg) => msg.clone(),
            _ => "internal server error".to_string(),
        };
        (status, message).into_response()
    }
}

/// Error returned by the Google Calendar REST API.
#[derive(Debug, Clone, ThisError, PartialEq)]
#[error("status {status}: {message}")]
pub struct CalendarApiError {
    pub status: u16,
    pub message: String,
    /// `reason` of every entry in the provider's `errors` array, in order.
    pub reasons: Vec<String>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorItem>,
}

#[derive(Deserialize)]
struct GoogleErrorItem {
    #[serde(default)]
    reason: String,
}

impl CalendarApiError {
    pub fn new(status: u16, message: impl Into<String>, reasons: Vec<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reasons,
        }
    }

    /// Build from a non-success response body. Bodies that are not Google's
    /// JSON error envelope keep their raw text as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<GoogleErrorEnvelope>(body) {
            Ok(envelope) => Self {
                status,
                message: envelope.error.message,
                reasons: envelope
                    .error
                    .errors
                    .into_iter()
                    .map(|item| item.reason)
                    .collect(),
            },
            Err(_) => Self {
                status,
                message: body.trim().to_string(),
                reasons: Vec::new(),
            },
        }
    }

    /// True only when the provider reports exactly one cause and that cause is
    /// the channel id being in use. Any accompanying cause makes it fatal.
    pub fn is_channel_id_collision(&self) -> bool {
        matches!(self.reasons.as_slice(), [reason] if reason == CHANNEL_ID_NOT_UNIQUE)
    }

    pub fn is_gone(&self) -> bool {
        self.status == StatusCode::GONE.as_u16()
    }
}
