use tracing::debug;

use super::provider::CalendarProvider;
use super::types::{Event, EventsQuery};
use crate::error::CalpushError;

/// Everything returned by one complete walk of a calendar's event pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub items: Vec<Event>,
    /// Cursor from the terminal page; presenting it next time yields only later changes.
    pub next_sync_token: String,
}

/// Page through `calendar_id` from `sync_token` (or from the beginning when
/// `None`) until the provider stops handing out page tokens.
///
/// Pages are requested strictly one after another. A 410 on an incremental
/// pull means the cursor expired and is reported as `SyncCursorInvalid`.
pub async fn collect_changes(
    provider: &dyn CalendarProvider,
    access_token: &str,
    calendar_id: &str,
    sync_token: Option<&str>,
) -> Result<ChangeSet, CalpushError> {
    let mut items = Vec::new();
    let mut query = EventsQuery {
        sync_token: sync_token.map(str::to_string),
        page_token: None,
    };
    let mut pages = 0usize;

    loop {
        let page = match provider.list_events(access_token, calendar_id, &query).await {
            Ok(page) => page,
            Err(CalpushError::Calendar(e)) if sync_token.is_some() && e.is_gone() => {
                return Err(CalpushError::SyncCursorInvalid {
                    calendar_id: calendar_id.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        pages += 1;
        items.extend(page.items);

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(next) => query.page_token = Some(next),
            None => {
                let next_sync_token = page
                    .next_sync_token
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| CalpushError::MissingSyncToken(calendar_id.to_string()))?;
                debug!(calendar_id, pages, items = items.len(), "event pages collected");
                return Ok(ChangeSet {
                    items,
                    next_sync_token,
                });
            }
        }
    }
}
