//! Remote calendar provider: wire types, the provider trait and its Google
//! Calendar v3 implementation.

pub mod changes;
pub mod client;
pub mod provider;
pub mod types;

pub use changes::{ChangeSet, collect_changes};
pub use client::GoogleCalendarClient;
pub use provider::CalendarProvider;
pub use types::{
    CalendarListEntry, Event, EventPatch, EventReminders, EventsPage, EventsQuery, WatchRequest,
    WatchResponse,
};
