use async_trait::async_trait;

use super::types::{
    CalendarListEntry, EventPatch, EventsPage, EventsQuery, WatchRequest, WatchResponse,
};
use crate::error::CalpushError;

/// Operations this service needs from the remote calendar provider.
///
/// Every call carries the caller's access token; implementations hold no
/// per-user state.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Create a push subscription on `calendar_id`.
    async fn watch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &WatchRequest,
    ) -> Result<WatchResponse, CalpushError>;

    /// Cancel the subscription addressed by `(channel_id, resource_id)`.
    async fn stop_channel(
        &self,
        access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), CalpushError>;

    /// Fetch one page of events, optionally incremental from a sync token.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
    ) -> Result<EventsPage, CalpushError>;

    async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<(), CalpushError>;

    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<CalendarListEntry>, CalpushError>;
}
