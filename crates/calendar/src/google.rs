//! Google Calendar v3 REST backend.
//!
//! Talks to `https://www.googleapis.com/calendar/v3` with an OAuth bearer
//! token obtained elsewhere. Token refresh is the caller's business.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parley_core::calendar::{CalendarBackend, CalendarEvent, CreatedEvent, NewEvent};
use parley_core::error::CalendarError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Placeholder used when an event has no summary.
const UNTITLED: &str = "(no title)";

pub struct GoogleCalendar {
    base_url: String,
    calendar_id: String,
    access_token: String,
    client: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new(access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            calendar_id: "primary".into(),
            access_token: access_token.into(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]`, path-encoded.
    fn events_url(&self, event_id: Option<&str>) -> Result<reqwest::Url, CalendarError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| CalendarError::NotConfigured(format!("bad calendar api_url: {e}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CalendarError::NotConfigured("calendar api_url cannot be a base".into())
            })?;
            segments.pop_if_empty();
            segments.extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn fetch_events(&self, query: &[(&str, String)]) -> Result<Vec<CalendarEvent>, CalendarError> {
        let url = self.events_url(None)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        let response = check_status(response).await?;
        let list: ApiEventList = response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

        Ok(list.items.into_iter().map(ApiEvent::into_event).collect())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(response),
        401 | 403 => Err(CalendarError::AuthenticationFailed(
            "Invalid or expired access token".into(),
        )),
        404 | 410 => Err(CalendarError::NotFound(response.url().path().to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Calendar API returned error");
            Err(CalendarError::ApiError {
                status_code: status,
                message: body,
            })
        }
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    fn name(&self) -> &str {
        "google"
    }

    async fn list_upcoming(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!(calendar = %self.calendar_id, max_results, "Listing upcoming events");
        self.fetch_events(&[
            ("timeMin", now_rfc3339()),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".into()),
            ("orderBy", "startTime".into()),
        ])
        .await
    }

    async fn insert(&self, event: NewEvent) -> Result<CreatedEvent, CalendarError> {
        let url = self.events_url(None)?;
        let body = ApiNewEvent {
            summary: &event.summary,
            description: event.description.as_deref(),
            start: ApiEventTimeOut {
                date_time: &event.start,
                time_zone: &event.time_zone,
            },
            end: ApiEventTimeOut {
                date_time: &event.end,
                time_zone: &event.time_zone,
            },
        };

        debug!(calendar = %self.calendar_id, start = %event.start, end = %event.end, "Inserting event");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        let created: ApiEvent = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }

    async fn delete(&self, event_id: &str) -> Result<(), CalendarError> {
        let url = self.events_url(Some(event_id))?;
        debug!(calendar = %self.calendar_id, event_id, "Deleting event");

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        match check_status(response).await {
            Err(CalendarError::NotFound(_)) => Err(CalendarError::NotFound(event_id.to_string())),
            other => other.map(|_| ()),
        }
    }

    async fn search(
        &self,
        query: &str,
        time_min: Option<&str>,
        time_max: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(min) = time_min {
            params.push(("timeMin", min.to_string()));
        }
        if let Some(max) = time_max {
            params.push(("timeMax", max.to_string()));
        }
        self.fetch_events(&params).await
    }
}

// --- Calendar API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiEventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start: Option<ApiEventTime>,
    #[serde(default)]
    end: Option<ApiEventTime>,
    #[serde(default)]
    html_link: Option<String>,
}

/// Timed events carry `dateTime`, all-day events only `date`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl ApiEventTime {
    fn into_string(self) -> Option<String> {
        self.date_time.or(self.date)
    }
}

impl ApiEvent {
    fn into_event(self) -> CalendarEvent {
        CalendarEvent {
            id: self.id,
            summary: self
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            description: self.description,
            start: self.start.and_then(ApiEventTime::into_string).unwrap_or_default(),
            end: self.end.and_then(ApiEventTime::into_string),
            html_link: self.html_link,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiNewEvent<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: ApiEventTimeOut<'a>,
    end: ApiEventTimeOut<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTimeOut<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}
