//! Calendar backend trait — the abstraction over the user's calendar.
//!
//! The calendar tools only talk to this trait; the Google Calendar REST
//! adapter and the in-memory test calendar live in `parley-calendar`.

use crate::error::CalendarError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An event as read back from the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RFC 3339 date-time, or a bare `YYYY-MM-DD` for all-day events.
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

/// An event to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Local wall-clock start, `YYYY-MM-DDTHH:MM:SS`.
    pub start: String,
    /// Local wall-clock end, `YYYY-MM-DDTHH:MM:SS`.
    pub end: String,
    /// IANA zone the wall-clock times are in.
    pub time_zone: String,
}

/// Confirmation of an inserted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// A short name for logs (e.g., "google", "in_memory").
    fn name(&self) -> &str;

    /// Up to `max_results` events starting from now, in start-time order.
    async fn list_upcoming(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError>;

    async fn insert(&self, event: NewEvent) -> Result<CreatedEvent, CalendarError>;

    async fn delete(&self, event_id: &str) -> Result<(), CalendarError>;

    /// Free-text search, optionally bounded by RFC 3339 instants.
    async fn search(
        &self,
        query: &str,
        time_min: Option<&str>,
        time_max: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}
