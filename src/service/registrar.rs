use std::sync::Arc;

use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use super::channel_locks::ChannelLocks;
use crate::calendar::{CalendarProvider, WatchRequest, collect_changes};
use crate::db::{Storage, WatchChannel};
use crate::error::CalpushError;

/// Filler for characters Google does not accept in channel ids.
const CHANNEL_ID_FILLER: char = '-';

/// Deterministic channel id for a (principal, calendar) pair.
///
/// Characters outside `[A-Za-z0-9-_+/=]` each become `-`, so registering the
/// same pair again always targets the same remote channel.
pub fn derive_channel_id(principal_id: &str, calendar_id: &str) -> String {
    format!("{principal_id}-{calendar_id}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '/' | '=') {
                c
            } else {
                CHANNEL_ID_FILLER
            }
        })
        .collect()
}

/// Registration progress.
///
/// `Creating -> CollisionDetected -> Freeing -> Creating` repeats once per
/// collision until creation succeeds, a non-collision error occurs, or the
/// recovery budget runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Creating,
    CollisionDetected,
    Freeing { resource_id: String },
}

/// Creates (or re-creates) the watch channel for a calendar and records it.
pub struct ChannelRegistrar {
    calendar: Arc<dyn CalendarProvider>,
    storage: Storage,
    locks: ChannelLocks,
    max_collision_retries: u32,
}

impl ChannelRegistrar {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        storage: Storage,
        locks: ChannelLocks,
        max_collision_retries: u32,
    ) -> Self {
        Self {
            calendar,
            storage,
            locks,
            max_collision_retries,
        }
    }

    /// Register a watch channel on `calendar_id` delivering to `callback_url`.
    ///
    /// On success the channel is stored with a baseline cursor taken from a
    /// full listing of the calendar. A remote subscription created before a
    /// later step fails is left in place.
    pub async fn register(
        &self,
        principal_id: &str,
        calendar_id: &str,
        access_token: &str,
        callback_url: &Url,
    ) -> Result<WatchChannel, CalpushError> {
        let channel_id = derive_channel_id(principal_id, calendar_id);
        let (verification_token, resource_id) = self
            .create_channel(&channel_id, calendar_id, access_token, callback_url)
            .await?;

        let baseline = collect_changes(self.calendar.as_ref(), access_token, calendar_id, None)
            .await
            .inspect_err(|e| {
                error!(%channel_id, calendar_id, error = %e, "baseline listing failed");
            })?;

        let channel = WatchChannel {
            channel_id,
            principal_id: principal_id.to_string(),
            verification_token,
            resource_id,
            calendar_id: calendar_id.to_string(),
            sync_cursor: baseline.next_sync_token,
        };
        // A sync pass in flight finishes its cursor write before the new baseline lands.
        let guard = self.locks.acquire(&channel.channel_id).await;
        self.storage.upsert_channel(&channel).await.inspect_err(|e| {
            error!(channel_id = %channel.channel_id, error = %e, "failed to store channel");
        })?;
        drop(guard);

        info!(
            channel_id = %channel.channel_id,
            principal_id,
            calendar_id,
            "watch channel registered"
        );
        Ok(channel)
    }

    /// Drive the collision state machine until the deterministic id is bound
    /// to a fresh subscription. Returns `(verification_token, resource_id)`.
    async fn create_channel(
        &self,
        channel_id: &str,
        calendar_id: &str,
        access_token: &str,
        callback_url: &Url,
    ) -> Result<(String, String), CalpushError> {
        let mut collisions = 0u32;
        let mut phase = Phase::Creating;

        loop {
            phase = match phase {
                Phase::Creating => {
                    let token = Uuid::new_v4().to_string();
                    let request =
                        WatchRequest::web_hook(channel_id, callback_url, Some(token.clone()));
                    match self
                        .calendar
                        .watch_events(access_token, calendar_id, &request)
                        .await
                    {
                        Ok(watch) => return Ok((token, watch.resource_id)),
                        Err(CalpushError::Calendar(e)) if e.is_channel_id_collision() => {
                            Phase::CollisionDetected
                        }
                        Err(e) => {
                            error!(channel_id, calendar_id, error = %e, "failed to watch events");
                            return Err(e);
                        }
                    }
                }
                Phase::CollisionDetected => {
                    collisions += 1;
                    if collisions > self.max_collision_retries {
                        error!(channel_id, collisions, "channel id collision not resolved");
                        return Err(CalpushError::CollisionUnresolved {
                            channel_id: channel_id.to_string(),
                            attempts: self.max_collision_retries,
                        });
                    }
                    warn!(
                        channel_id,
                        collisions, "channel id in use; freeing stale subscription"
                    );
                    let resource_id = self
                        .capture_resource_id(calendar_id, access_token, callback_url)
                        .await
                        .inspect_err(|e| {
                            error!(channel_id, error = %e, "failed to get resource id");
                        })?;
                    Phase::Freeing { resource_id }
                }
                Phase::Freeing { resource_id } => {
                    self.calendar
                        .stop_channel(access_token, channel_id, &resource_id)
                        .await
                        .inspect_err(|e| {
                            error!(
                                channel_id,
                                %resource_id,
                                error = %e,
                                "failed to stop stale channel"
                            );
                        })?;
                    Phase::Creating
                }
            };
        }
    }

    /// The provider only reveals a calendar's resource handle when a channel
    /// is created, so open a throwaway channel, note its handle and close it.
    ///
    /// The throwaway shares the real callback URL and could in principle be
    /// pinged before it is stopped; such a ping carries no matching
    /// verification token and is rejected as not found.
    async fn capture_resource_id(
        &self,
        calendar_id: &str,
        access_token: &str,
        callback_url: &Url,
    ) -> Result<String, CalpushError> {
        let throwaway_id = Uuid::new_v4().to_string();
        let request = WatchRequest::web_hook(throwaway_id.as_str(), callback_url, None);
        let watch = self
            .calendar
            .watch_events(access_token, calendar_id, &request)
            .await?;
        self.calendar
            .stop_channel(access_token, &throwaway_id, &watch.resource_id)
            .await?;
        Ok(watch.resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_is_deterministic() {
        assert_eq!(derive_channel_id("u1", "cal-1"), "u1-cal-1");
        assert_eq!(
            derive_channel_id("u1", "cal-1"),
            derive_channel_id("u1", "cal-1")
        );
    }

    #[test]
    fn unsafe_characters_become_filler() {
        assert_eq!(
            derive_channel_id("1084", "team@group.calendar.google.com"),
            "1084-team-group-calendar-google-com"
        );
        assert_eq!(derive_channel_id("u1", "a+b/c=d_e"), "u1-a+b/c=d_e");
        assert_eq!(derive_channel_id("u1", "é#"), "u1---");
    }
}
