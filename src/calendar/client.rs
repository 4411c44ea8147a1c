use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::provider::CalendarProvider;
use super::types::{
    CalendarListEntry, CalendarListPage, EventPatch, EventsPage, EventsQuery, WatchRequest,
    WatchResponse,
};
use crate::error::{CalendarApiError, CalpushError};

/// Google Calendar v3 over REST.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopChannelBody<'a> {
    id: &'a str,
    resource_id: &'a str,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// Append percent-encoded path segments to the API base.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalpushError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CalpushError::UrlParse(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, CalpushError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CalendarApiError::from_body(status.as_u16(), &body).into())
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn watch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &WatchRequest,
    ) -> Result<WatchResponse, CalpushError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", "watch"])?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;
        let watch: WatchResponse = Self::ensure_success(resp).await?.json().await?;
        debug!(
            calendar_id,
            channel_id = %watch.id,
            resource_id = %watch.resource_id,
            "watch channel created"
        );
        Ok(watch)
    }

    async fn stop_channel(
        &self,
        access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), CalpushError> {
        let url = self.endpoint(&["channels", "stop"])?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&StopChannelBody {
                id: channel_id,
                resource_id,
            })
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        debug!(channel_id, resource_id, "watch channel stopped");
        Ok(())
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
    ) -> Result<EventsPage, CalpushError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let mut params: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(sync_token) = query.sync_token.as_deref() {
            params.push(("syncToken", sync_token));
        }
        if let Some(page_token) = query.page_token.as_deref() {
            params.push(("pageToken", page_token));
        }
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await?;
        Ok(Self::ensure_success(resp).await?.json().await?)
    }

    async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<(), CalpushError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        let resp = self
            .http
            .patch(url)
            .bearer_auth(access_token)
            .json(patch)
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }

    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<CalendarListEntry>, CalpushError> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(url.clone()).bearer_auth(access_token);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }
            let page: CalendarListPage =
                Self::ensure_success(request.send().await?).await?.json().await?;
            calendars.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(calendars),
            }
        }
    }
}
