use serde::{Deserialize, Serialize};
use url::Url;

/// Channel type Google expects for HTTPS push delivery.
pub const WEB_HOOK: &str = "web_hook";

/// Summary text of events whose reminders get overridden.
pub const BUSY_SUMMARY: &str = "Busy";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WatchRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl WatchRequest {
    pub fn web_hook(id: impl Into<String>, address: &Url, token: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind: WEB_HOOK.to_string(),
            address: address.to_string(),
            token,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub id: String,
    pub resource_id: String,
    #[serde(default)]
    pub resource_uri: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventReminders {
    #[serde(default)]
    pub use_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reminders: Option<EventReminders>,
}

impl Event {
    /// A "Busy" event still relying on the calendar's default reminders.
    pub fn needs_reminder_override(&self) -> bool {
        self.summary.as_deref() == Some(BUSY_SUMMARY)
            && self.reminders.as_ref().is_some_and(|r| r.use_default)
    }
}

/// Partial update sent to `events.patch`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventPatch {
    pub reminders: EventReminders,
}

impl EventPatch {
    /// Switch the event off default reminders. Re-applying it is a no-op.
    pub fn disable_default_reminders() -> Self {
        Self {
            reminders: EventReminders { use_default: false },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsQuery {
    pub sync_token: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<Event>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalendarListPage {
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
}
