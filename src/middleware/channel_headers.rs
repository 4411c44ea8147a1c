use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use std::convert::Infallible;

use crate::service::Notification;

pub const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
pub const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";
pub const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";
pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
pub const MESSAGE_NUMBER_HEADER: &str = "x-goog-message-number";

/// Push-notification metadata Google attaches to every webhook delivery.
///
/// Absent identifiers are read as empty strings; such a triple never matches a
/// stored channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelHeaders {
    pub notification: Notification,
    /// `sync`, `exists` or `not_exists`.
    pub resource_state: Option<String>,
    pub message_number: Option<String>,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl ChannelHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            notification: Notification {
                channel_id: header_str(headers, CHANNEL_ID_HEADER).unwrap_or_default(),
                verification_token: header_str(headers, CHANNEL_TOKEN_HEADER).unwrap_or_default(),
                resource_id: header_str(headers, RESOURCE_ID_HEADER).unwrap_or_default(),
            },
            resource_state: header_str(headers, RESOURCE_STATE_HEADER),
            message_number: header_str(headers, MESSAGE_NUMBER_HEADER),
        }
    }
}

impl<S> FromRequestParts<S> for ChannelHeaders
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
