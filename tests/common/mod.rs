#![allow(dead_code)]

use async_trait::async_trait;
use calpush::calendar::{
    CalendarListEntry, CalendarProvider, Event, EventPatch, EventReminders, EventsPage,
    EventsQuery, WatchRequest, WatchResponse,
};
use calpush::db::{Credential, Storage};
use calpush::error::{CHANNEL_ID_NOT_UNIQUE, CalendarApiError, CalpushError};
use calpush::google_oauth::{RefreshedToken, TokenSource};
use chrono::{Duration, Utc};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A throwaway SQLite file, removed on drop.
pub struct TempDb {
    pub path: PathBuf,
    pub storage: Storage,
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub async fn temp_db(label: &str) -> TempDb {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut path = std::env::temp_dir();
    path.push(format!(
        "calpush-{label}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));

    let database_url = format!("sqlite:{}", path.display());
    let storage = Storage::connect(&database_url)
        .await
        .expect("failed to open test database");
    TempDb { path, storage }
}

pub fn credential(principal_id: &str) -> Credential {
    Credential {
        principal_id: principal_id.to_string(),
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

pub fn collision() -> CalendarApiError {
    CalendarApiError::new(
        400,
        "Channel id not unique",
        vec![CHANNEL_ID_NOT_UNIQUE.to_string()],
    )
}

pub fn server_error() -> CalendarApiError {
    CalendarApiError::new(503, "backend unavailable", Vec::new())
}

pub fn busy_default(id: &str) -> Event {
    event(id, "Busy", true)
}

pub fn event(id: &str, summary: &str, use_default: bool) -> Event {
    Event {
        id: id.to_string(),
        status: Some("confirmed".to_string()),
        summary: Some(summary.to_string()),
        reminders: Some(EventReminders { use_default }),
    }
}

pub fn page(items: Vec<Event>, next_page: Option<&str>, next_sync: Option<&str>) -> EventsPage {
    EventsPage {
        items,
        next_page_token: next_page.map(str::to_string),
        next_sync_token: next_sync.map(str::to_string),
    }
}

pub fn watched(id: &str, resource_id: &str) -> WatchResponse {
    WatchResponse {
        id: id.to_string(),
        resource_id: resource_id.to_string(),
        resource_uri: None,
        expiration: None,
    }
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Watch {
        channel_id: String,
        token: Option<String>,
        address: String,
    },
    Stop {
        channel_id: String,
        resource_id: String,
    },
    List {
        calendar_id: String,
        sync_token: Option<String>,
        page_token: Option<String>,
    },
    Patch {
        calendar_id: String,
        event_id: String,
        use_default: bool,
    },
    ListCalendars,
}

/// Scripted provider. Queued results are consumed in order; an empty watch
/// queue answers with `res-default`, an empty page queue with an empty page
/// carrying `sync-default`.
#[derive(Default)]
pub struct FakeCalendar {
    watches: Mutex<VecDeque<Result<WatchResponse, CalendarApiError>>>,
    pages: Mutex<VecDeque<Result<EventsPage, CalendarApiError>>>,
    failing_patches: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_watch(&self, result: Result<WatchResponse, CalendarApiError>) {
        self.watches.lock().unwrap().push_back(result);
    }

    pub fn queue_page(&self, result: Result<EventsPage, CalendarApiError>) {
        self.pages.lock().unwrap().push_back(result);
    }

    pub fn fail_patch(&self, event_id: &str) {
        self.failing_patches
            .lock()
            .unwrap()
            .insert(event_id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn patched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Patch { event_id, .. } => Some(event_id),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn watch_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        request: &WatchRequest,
    ) -> Result<WatchResponse, CalpushError> {
        self.record(Call::Watch {
            channel_id: request.id.clone(),
            token: request.token.clone(),
            address: request.address.clone(),
        });
        match self.watches.lock().unwrap().pop_front() {
            Some(result) => result.map_err(CalpushError::from),
            None => Ok(watched(&request.id, "res-default")),
        }
    }

    async fn stop_channel(
        &self,
        _access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), CalpushError> {
        self.record(Call::Stop {
            channel_id: channel_id.to_string(),
            resource_id: resource_id.to_string(),
        });
        Ok(())
    }

    async fn list_events(
        &self,
        _access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
    ) -> Result<EventsPage, CalpushError> {
        self.record(Call::List {
            calendar_id: calendar_id.to_string(),
            sync_token: query.sync_token.clone(),
            page_token: query.page_token.clone(),
        });
        match self.pages.lock().unwrap().pop_front() {
            Some(result) => result.map_err(CalpushError::from),
            None => Ok(page(Vec::new(), None, Some("sync-default"))),
        }
    }

    async fn patch_event(
        &self,
        _access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<(), CalpushError> {
        self.record(Call::Patch {
            calendar_id: calendar_id.to_string(),
            event_id: event_id.to_string(),
            use_default: patch.reminders.use_default,
        });
        if self.failing_patches.lock().unwrap().contains(event_id) {
            return Err(server_error().into());
        }
        Ok(())
    }

    async fn list_calendars(
        &self,
        _access_token: &str,
    ) -> Result<Vec<CalendarListEntry>, CalpushError> {
        self.record(Call::ListCalendars);
        Ok(Vec::new())
    }
}

/// Hands out a fixed token, standing in for the OAuth refresh path.
pub struct StaticTokens {
    pub token: RefreshedToken,
}

impl StaticTokens {
    pub fn unchanged(cred: &Credential) -> Self {
        Self {
            token: RefreshedToken::unchanged(cred),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokens {
    async fn token(&self, _credential: &Credential) -> Result<RefreshedToken, CalpushError> {
        Ok(self.token.clone())
    }
}
