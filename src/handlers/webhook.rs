use axum::{extract::State, http::StatusCode};
use tracing::{error, info, warn};

use crate::error::CalpushError;
use crate::middleware::ChannelHeaders;
use crate::router::AppState;

/// POST /webhook -> one incremental sync pass for the notifying channel.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: ChannelHeaders,
) -> Result<StatusCode, CalpushError> {
    let notification = &headers.notification;
    match state.sync.handle_notification(notification).await {
        Ok(report) => {
            info!(
                channel_id = %report.channel_id,
                resource_state = headers.resource_state.as_deref().unwrap_or("-"),
                message_number = headers.message_number.as_deref().unwrap_or("-"),
                fetched = report.fetched,
                patched = report.patched.len(),
                "notification processed"
            );
            Ok(StatusCode::OK)
        }
        Err(e) if e.is_not_found() => {
            warn!(channel_id = %notification.channel_id, error = %e, "failed to find channel");
            Err(e)
        }
        Err(e) => {
            error!(
                channel_id = %notification.channel_id,
                resource_state = headers.resource_state.as_deref().unwrap_or("-"),
                error = %e,
                "notification failed"
            );
            Err(e)
        }
    }
}
