//! In-memory calendar — useful for testing and offline sessions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parley_core::calendar::{CalendarBackend, CalendarEvent, CreatedEvent, NewEvent};
use parley_core::error::CalendarError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A calendar that keeps its events in a Vec.
///
/// Every stored event counts as upcoming. All inserts are recorded so tests
/// can assert on exactly what a tool sent.
pub struct InMemoryCalendar {
    events: Arc<RwLock<Vec<CalendarEvent>>>,
    inserted: Arc<RwLock<Vec<NewEvent>>>,
    failure: Arc<RwLock<Option<CalendarError>>>,
    next_id: AtomicU64,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Arc::new(RwLock::new(events)),
            inserted: Arc::new(RwLock::new(Vec::new())),
            failure: Arc::new(RwLock::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Every `NewEvent` passed to `insert`, in call order.
    pub async fn inserted(&self) -> Vec<NewEvent> {
        self.inserted.read().await.clone()
    }

    /// Make every subsequent call fail with `error` (`None` to recover).
    pub async fn fail_with(&self, error: Option<CalendarError>) {
        *self.failure.write().await = error;
    }

    async fn check_failure(&self) -> Result<(), CalendarError> {
        match self.failure.read().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn sorted(mut events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
        events.sort_by_cached_key(|e| {
            let key = start_key(&e.start);
            (key.is_none(), key, e.start.clone())
        });
        events
    }
}

/// Parse an event start into an instant.
///
/// Offset-less timestamps and all-day dates are read as UTC.
fn start_key(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whether `start` is at or after `bound`; falls back to string order when
/// either side does not parse.
fn not_before(start: &str, bound: &str) -> bool {
    match (start_key(start), start_key(bound)) {
        (Some(s), Some(b)) => s >= b,
        _ => start >= bound,
    }
}

impl Default for InMemoryCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendar {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list_upcoming(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.check_failure().await?;
        let mut events = Self::sorted(self.events.read().await.clone());
        events.truncate(max_results as usize);
        Ok(events)
    }

    async fn insert(&self, event: NewEvent) -> Result<CreatedEvent, CalendarError> {
        self.check_failure().await?;
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let html_link = format!("memory://events/{id}");

        self.events.write().await.push(CalendarEvent {
            id: id.clone(),
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: event.start.clone(),
            end: Some(event.end.clone()),
            html_link: Some(html_link.clone()),
        });
        self.inserted.write().await.push(event);

        Ok(CreatedEvent {
            id,
            html_link: Some(html_link),
        })
    }

    async fn delete(&self, event_id: &str) -> Result<(), CalendarError> {
        self.check_failure().await?;
        let mut events = self.events.write().await;
        let len_before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == len_before {
            return Err(CalendarError::NotFound(event_id.to_string()));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        time_min: Option<&str>,
        time_max: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.check_failure().await?;
        let needle = query.to_lowercase();
        let events = self.events.read().await;

        let matches = events
            .iter()
            .filter(|e| {
                e.summary.to_lowercase().contains(&needle)
                    || e.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .filter(|e| time_min.is_none_or(|min| not_before(&e.start, min)))
            .filter(|e| time_max.is_none_or(|max| !not_before(&e.start, max)))
            .cloned()
            .collect();

        Ok(Self::sorted(matches))
    }
}
