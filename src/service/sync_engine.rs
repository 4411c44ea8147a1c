use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::channel_locks::ChannelLocks;
use super::rotator::CredentialRotator;
use crate::calendar::{CalendarProvider, Event, EventPatch, collect_changes};
use crate::db::Storage;
use crate::error::CalpushError;
use crate::google_oauth::TokenSource;

/// Identifiers carried by one push delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub channel_id: String,
    pub verification_token: String,
    pub resource_id: String,
}

/// Outcome of a completed sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub channel_id: String,
    pub fetched: usize,
    pub patched: Vec<String>,
    pub sync_cursor: String,
}

/// Handles webhook deliveries: authenticate, pull changes since the stored
/// cursor, override reminders on matching events, then advance the cursor.
pub struct SyncEngine {
    storage: Storage,
    tokens: Arc<dyn TokenSource>,
    calendar: Arc<dyn CalendarProvider>,
    rotator: CredentialRotator,
    locks: ChannelLocks,
}

impl SyncEngine {
    pub fn new(
        storage: Storage,
        tokens: Arc<dyn TokenSource>,
        calendar: Arc<dyn CalendarProvider>,
        locks: ChannelLocks,
    ) -> Self {
        let rotator = CredentialRotator::new(storage.clone());
        Self {
            storage,
            tokens,
            calendar,
            rotator,
            locks,
        }
    }

    /// Process one delivery. Any failure leaves the stored cursor untouched,
    /// so a redelivery reprocesses the same window.
    pub async fn handle_notification(
        &self,
        notification: &Notification,
    ) -> Result<SyncReport, CalpushError> {
        // Held for the whole pass; a queued delivery reads the advanced cursor.
        let _guard = self.locks.acquire(&notification.channel_id).await;

        let channel = self
            .storage
            .find_channel(
                &notification.channel_id,
                &notification.verification_token,
                &notification.resource_id,
            )
            .await?
            .ok_or(CalpushError::ChannelNotFound)?;

        let credential = self
            .storage
            .get_credential(&channel.principal_id)
            .await?
            .ok_or_else(|| CalpushError::UserNotFound(channel.principal_id.clone()))?;

        let token = self.tokens.token(&credential).await?;
        self.rotator.reconcile(&credential, &token).await?;

        if channel.sync_cursor.is_empty() {
            return Err(CalpushError::SyncCursorInvalid {
                calendar_id: channel.calendar_id.clone(),
            });
        }

        let changes = collect_changes(
            self.calendar.as_ref(),
            &token.access_token,
            &channel.calendar_id,
            Some(&channel.sync_cursor),
        )
        .await
        .inspect_err(|e| {
            error!(channel_id = %channel.channel_id, error = %e, "failed to list events");
        })?;

        let targets: Vec<&Event> = changes
            .items
            .iter()
            .filter(|event| event.needs_reminder_override())
            .collect();
        debug!(
            channel_id = %channel.channel_id,
            fetched = changes.items.len(),
            targets = targets.len(),
            "changes pulled"
        );

        let patch = EventPatch::disable_default_reminders();
        let mut patched = Vec::with_capacity(targets.len());
        for event in targets {
            self.calendar
                .patch_event(&token.access_token, &channel.calendar_id, &event.id, &patch)
                .await
                .inspect_err(|e| {
                    error!(
                        channel_id = %channel.channel_id,
                        event_id = %event.id,
                        error = %e,
                        "failed to patch event"
                    );
                })?;
            info!(channel_id = %channel.channel_id, event_id = %event.id, "reminders overridden");
            patched.push(event.id.clone());
        }

        self.storage
            .update_sync_cursor(&channel.channel_id, &changes.next_sync_token)
            .await
            .inspect_err(|e| {
                warn!(channel_id = %channel.channel_id, error = %e, "failed to update channel");
            })?;

        Ok(SyncReport {
            channel_id: channel.channel_id,
            fetched: changes.items.len(),
            patched,
            sync_cursor: changes.next_sync_token,
        })
    }
}
